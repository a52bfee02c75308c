use secpoll::{
    backend::PlainBackend,
    channel::SimpleChannel,
    config::SessionConfig,
    oracle::{check_outcome, expected_no_flags, expected_winner},
    poll::{Algorithm, PollError, PollOutcome, run_poll},
    repr::{Recipient, Role},
    select::SelectError,
    session::Session,
    table::{Encoding, Entry, GeneratedTables, Table, generate_tables},
    wire::{decode_outcome, encode_outcome},
};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn run_both(
    server_table: &Table,
    client_table: &Table,
    algorithm: Algorithm,
    config: &SessionConfig,
) -> Result<(PollOutcome, PollOutcome), PollError> {
    let (server_channel, client_channel) = SimpleChannel::pair();
    let mut server = Session::new(PlainBackend::new(Role::Server, config, server_channel));
    let mut client = Session::new(PlainBackend::new(Role::Client, config, client_channel));
    tokio::try_join!(
        run_poll(&mut server, server_table, algorithm, config),
        run_poll(&mut client, client_table, algorithm, config),
    )
}

async fn check(tables: &GeneratedTables, algorithm: Algorithm, config: &SessionConfig) {
    let (server, client) = run_both(&tables.server, &tables.client, algorithm, config)
        .await
        .unwrap_or_else(|e| panic!("{algorithm} failed (seed {}): {e}", tables.seed));
    let weighted = algorithm.is_weighted();
    if let Err(e) = check_outcome(&tables.plain, weighted, &server, tables.seed) {
        panic!("{algorithm}, server: {e}\n{}", tables.plain);
    }
    if let Err(e) = check_outcome(&tables.plain, weighted, &client, tables.seed) {
        panic!("{algorithm}, client: {e}\n{}", tables.plain);
    }
    assert_eq!(server.winner, client.winner);
    assert_eq!(
        server.no_flags.len(),
        if config.no_recipient.includes(Role::Server) { tables.plain.num_rows() } else { 0 }
    );
    assert_eq!(
        client.no_flags.len(),
        if config.no_recipient.includes(Role::Client) { tables.plain.num_rows() } else { 0 }
    );
}

#[tokio::test]
async fn every_algorithm_agrees_with_the_plaintext_count() {
    init_tracing();
    let config = SessionConfig::default();
    for algorithm in Algorithm::ALL {
        for (rows, columns, seed) in [(1, 1, 0), (5, 3, 1), (9, 7, 2), (16, 2, 3)] {
            let tables =
                generate_tables(rows, columns, algorithm.encoding(), config.max_weight, seed)
                    .unwrap();
            check(&tables, algorithm, &config).await;
        }
    }
}

#[tokio::test]
async fn flags_reach_the_configured_recipient() {
    init_tracing();
    for no_recipient in [Recipient::Server, Recipient::Client, Recipient::All] {
        let config = SessionConfig {
            no_recipient,
            ..SessionConfig::default()
        };
        let tables = generate_tables(6, 4, Encoding::Boolean, 3, 99).unwrap();
        check(&tables, Algorithm::GmwArithYao, &config).await;
        check(&tables, Algorithm::YaoWeighted, &config).await;
    }
}

#[tokio::test]
async fn small_weights_and_narrow_rings() {
    init_tracing();
    let config = SessionConfig {
        arithmetic_bitlen: 16,
        max_weight: 1,
        ..SessionConfig::default()
    };
    for seed in 10..14 {
        let tables = generate_tables(12, 5, Encoding::Boolean, 1, seed).unwrap();
        for algorithm in [
            Algorithm::GmwWeighted,
            Algorithm::YaoWeightedHybrid,
            Algorithm::GmwHybrid,
        ] {
            check(&tables, algorithm, &config).await;
        }
    }
}

#[tokio::test]
async fn the_documented_poll() {
    init_tracing();
    use Entry::{Maybe as M, No as N, Yes as Y};
    #[rustfmt::skip]
    let answers = [
        Y, N, M, N, Y,
        N, M, Y, N, Y,
        N, N, M, Y, Y,
        M, M, N, N, Y,
        Y, Y, N, M, Y,
    ];
    let plain = Table::from_entries(5, 5, &answers, Encoding::Boolean).unwrap();
    // the client holds an all-zero share, so the server's share is the plain table
    let zeros = Table::new(5, 5, vec![0; 25], Encoding::Boolean).unwrap();
    let config = SessionConfig::default();
    let (server, client) = run_both(&plain, &zeros, Algorithm::Yao, &config)
        .await
        .unwrap();
    assert_eq!(server.winner, 4);
    assert_eq!(expected_winner(&plain, false), Ok(4));
    assert_eq!(server.no_flags, vec![false; 5]);
    assert_eq!(expected_no_flags(&plain, 4), Ok(vec![false; 5]));
    assert!(client.no_flags.is_empty());

    let encoded = encode_outcome(&server).unwrap();
    assert_eq!(encoded, vec![0, 0, 0, 4, 0]);
    assert_eq!(decode_outcome(&encoded, 5).unwrap(), server);
}

#[tokio::test]
async fn incompatible_inputs_fail_before_any_exchange() {
    init_tracing();
    let config = SessionConfig::default();
    let unweighted = Table::from_entries(2, 2, &[Entry::No; 4], Encoding::Boolean).unwrap();
    let err = run_both(&unweighted, &unweighted, Algorithm::GmwWeighted, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, PollError::Select(SelectError::MissingWeights)));

    let tables = generate_tables(3, 3, Encoding::Boolean, 255, 5).unwrap();
    let err = run_both(&tables.server, &tables.client, Algorithm::ArithGmw, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, PollError::EncodingMismatch { .. }));

    let empty = Table::with_columns(0, Encoding::Boolean);
    let err = run_both(&empty, &empty, Algorithm::Gmw, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, PollError::Select(SelectError::EmptyTable { .. })));
}
