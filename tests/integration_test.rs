//! End-to-end tests of the analysis pipeline.
//!
//! Prices come from a mock data port (or a seeded in-memory SQLite store) and
//! artifacts are written to a temporary directory through `CsvStore`.

mod common;

use common::*;
use retcorr::adapters::csv_store::CsvStore;
use retcorr::domain::artifact::ArtifactKey;
use retcorr::domain::error::CorrError;
use retcorr::domain::normalize::Normalization;
use retcorr::domain::pipeline::{self, StageOutcome};
use retcorr::ports::artifact_port::ArtifactStore;
use tempfile::TempDir;

fn three_ticker_port() -> MockDataPort {
    let start = date(2019, 1, 1);
    MockDataPort::new()
        .with_prices("eur_usd", generate_prices(start, 400, 0))
        .with_prices("gbp_usd", generate_prices(start, 400, 1))
        .with_prices("usd_jpy", generate_prices(start, 400, 2))
}

mod full_pipeline {
    use super::*;

    #[test]
    fn run_all_writes_every_stage() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::new(dir.path().to_path_buf());
        let config = analysis_config(&["eur_usd", "gbp_usd", "usd_jpy"], dir.path().to_path_buf());

        let outcomes = pipeline::run_all(&three_ticker_port(), &store, &config).unwrap();

        let stages: Vec<&str> = outcomes.iter().map(|(s, _)| *s).collect();
        assert_eq!(
            stages,
            vec![
                "prices",
                "returns",
                "volatility",
                "normalize",
                "densities",
                "correlation",
                "intervals",
                "aggregate"
            ]
        );
        assert!(outcomes.iter().all(|(_, o)| !o.is_skipped()));

        // 2019 and 2020, 12 months + 4 quarters each
        let (_, densities) = &outcomes[4];
        assert_eq!(densities.paths().len(), 3);

        let (_, intervals) = &outcomes[6];
        assert_eq!(intervals.paths().len(), 2 * (12 + 4));
        assert!(intervals.paths().iter().all(|p| p.exists()));
    }

    #[test]
    fn returns_follow_prices() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::new(dir.path().to_path_buf());
        let config = analysis_config(&["eur_usd", "gbp_usd", "usd_jpy"], dir.path().to_path_buf());
        pipeline::run_all(&three_ticker_port(), &store, &config).unwrap();

        let prices = store.load_frame(&ArtifactKey::prices(&config.tag)).unwrap();
        let returns = store.load_frame(&ArtifactKey::returns(&config.tag)).unwrap();
        assert_eq!(prices.n_rows(), 400);
        assert_eq!(returns.n_rows(), 399);
        assert_eq!(returns.dates[0], prices.dates[1]);

        let p = prices.column(1);
        let expected = p[1] / p[0] - 1.0;
        assert!((returns.column(1)[0] - expected).abs() < 1e-12);

        let vol = store
            .load_frame(&ArtifactKey::volatility(&config.tag, config.volatility_window))
            .unwrap();
        assert_eq!(vol.n_rows(), 399 - (config.volatility_window - 1));
    }

    #[test]
    fn correlation_matrix_is_well_formed() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::new(dir.path().to_path_buf());
        let config = analysis_config(&["eur_usd", "gbp_usd", "usd_jpy"], dir.path().to_path_buf());
        pipeline::run_all(&three_ticker_port(), &store, &config).unwrap();

        let matrix = store
            .load_correlation(&ArtifactKey::correlation(&config.tag, &Normalization::Global))
            .unwrap();
        assert_eq!(matrix.labels, vec!["eur_usd", "gbp_usd", "usd_jpy"]);
        assert!(matrix.is_symmetric(1e-12));
        assert!(matrix.has_unit_diagonal(1e-12));
        assert!(matrix.values.iter().flatten().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn aggregated_sample_is_standardized() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::new(dir.path().to_path_buf());
        let config = analysis_config(&["eur_usd", "gbp_usd", "usd_jpy"], dir.path().to_path_buf());
        pipeline::run_all(&three_ticker_port(), &store, &config).unwrap();

        let sample = store
            .load_sample(&ArtifactKey::aggregated(&config.tag, &Normalization::Global))
            .unwrap();
        // three pairs, two whitened series of 399 rows each
        assert_eq!(sample.len(), 3 * 2 * 399);

        let n = sample.len() as f64;
        let mean = sample.iter().sum::<f64>() / n;
        let var = sample.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        assert!(mean.abs() < 1e-9);
        assert!((var - 1.0).abs() < 0.01);

        let density = std::fs::read_to_string(
            store.path_of(&ArtifactKey::density(&config.tag, &Normalization::Global)),
        )
        .unwrap();
        assert_eq!(density.lines().count(), 1 + config.bins);
    }

    #[test]
    fn local_normalization_discards_warmup_rows() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::new(dir.path().to_path_buf());
        let mut config =
            analysis_config(&["eur_usd", "gbp_usd", "usd_jpy"], dir.path().to_path_buf());
        config.normalization = Normalization::Local { window: 25 };
        pipeline::run_all(&three_ticker_port(), &store, &config).unwrap();

        let normalized = store
            .load_frame(&ArtifactKey::normalized(&config.tag, &config.normalization))
            .unwrap();
        assert_eq!(normalized.n_rows(), 399 - 24);
        assert!(
            store
                .path_of(&ArtifactKey::normalized(&config.tag, &config.normalization))
                .to_string_lossy()
                .contains("local_win_25")
        );
    }

    #[test]
    fn block_correlations_when_enabled() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::new(dir.path().to_path_buf());
        let mut config =
            analysis_config(&["eur_usd", "gbp_usd", "usd_jpy"], dir.path().to_path_buf());
        config.block_size = 100;

        let outcomes = pipeline::run_all(&three_ticker_port(), &store, &config).unwrap();
        let (stage, blocks) = &outcomes[7];
        assert_eq!(*stage, "blocks");
        // 399 rows: three full blocks and a tail of 99
        assert_eq!(blocks.paths().len(), 4);
    }
}

mod partial_universe {
    use super::*;

    #[test]
    fn failing_and_empty_tickers_are_skipped() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::new(dir.path().to_path_buf());
        let port = three_ticker_port()
            .with_error("aud_usd", "connection refused")
            .with_prices("nzd_usd", vec![]);
        let config = analysis_config(
            &["eur_usd", "aud_usd", "gbp_usd", "nzd_usd"],
            dir.path().to_path_buf(),
        );

        pipeline::prices_stage(&port, &store, &config).unwrap();
        let prices = store.load_frame(&ArtifactKey::prices(&config.tag)).unwrap();
        assert_eq!(prices.columns, vec!["eur_usd", "gbp_usd"]);
    }

    #[test]
    fn sparse_ticker_is_dropped_and_gaps_filled() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::new(dir.path().to_path_buf());
        let start = date(2019, 1, 1);

        let mut gappy = generate_prices(start, 100, 3);
        gappy.retain(|p| p.date != date(2019, 1, 10) && p.date != date(2019, 1, 11));
        let sparse: Vec<PricePoint> = generate_prices(start, 100, 4)
            .into_iter()
            .step_by(2)
            .collect();

        let port = MockDataPort::new()
            .with_prices("full", generate_prices(start, 100, 0))
            .with_prices("gappy", gappy)
            .with_prices("sparse", sparse);
        let config = analysis_config(&["full", "gappy", "sparse"], dir.path().to_path_buf());

        pipeline::prices_stage(&port, &store, &config).unwrap();
        let prices = store.load_frame(&ArtifactKey::prices(&config.tag)).unwrap();
        assert_eq!(prices.columns, vec!["full", "gappy"]);
        assert_eq!(prices.n_rows(), 100);

        let gappy = prices.column(1);
        assert_eq!(gappy[9], gappy[8]);
        assert_eq!(gappy[10], gappy[8]);
    }

    #[test]
    fn single_surviving_ticker_completes_the_run() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::new(dir.path().to_path_buf());
        let port = MockDataPort::new()
            .with_prices("eur_usd", generate_prices(date(2019, 1, 1), 200, 0))
            .with_error("gbp_usd", "connection refused");
        let config = analysis_config(&["eur_usd", "gbp_usd"], dir.path().to_path_buf());

        let outcomes = pipeline::run_all(&port, &store, &config).unwrap();
        for (stage, outcome) in &outcomes {
            let pairwise = matches!(*stage, "correlation" | "intervals" | "aggregate");
            assert_eq!(outcome.is_skipped(), pairwise, "stage {stage}");
        }
        let (stage, densities) = &outcomes[4];
        assert_eq!(*stage, "densities");
        assert_eq!(densities.paths().len(), 1);
    }

    #[test]
    fn no_usable_ticker_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::new(dir.path().to_path_buf());
        let port = MockDataPort::new().with_error("eur_usd", "boom");
        let config = analysis_config(&["eur_usd"], dir.path().to_path_buf());

        let err = pipeline::prices_stage(&port, &store, &config).unwrap_err();
        assert!(matches!(err, CorrError::NoData { .. }));
    }
}

mod stage_ordering {
    use super::*;

    #[test]
    fn stages_without_inputs_are_skipped() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::new(dir.path().to_path_buf());
        let config = analysis_config(&["eur_usd", "gbp_usd"], dir.path().to_path_buf());
        let norm = Normalization::Global;

        let outcomes = vec![
            pipeline::returns_stage(&store, &config).unwrap(),
            pipeline::volatility_stage(&store, &config, 20).unwrap(),
            pipeline::normalize_stage(&store, &config, &norm).unwrap(),
            pipeline::correlation_stage(&store, &config, &norm).unwrap(),
            pipeline::aggregate_stage(&store, &config, &norm).unwrap(),
        ];
        for outcome in outcomes {
            assert!(matches!(outcome, StageOutcome::Skipped { .. }));
        }
    }

    #[test]
    fn correlation_needs_matching_normalization() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::new(dir.path().to_path_buf());
        let config = analysis_config(&["eur_usd", "gbp_usd", "usd_jpy"], dir.path().to_path_buf());
        pipeline::run_all(&three_ticker_port(), &store, &config).unwrap();

        // only the global normalization was produced
        let local = Normalization::Local { window: 10 };
        assert!(pipeline::correlation_stage(&store, &config, &local).unwrap().is_skipped());
    }
}

#[cfg(feature = "sqlite")]
mod sqlite_source {
    use super::*;
    use retcorr::adapters::sqlite_adapter::SqliteAdapter;

    #[test]
    fn pipeline_reads_from_seeded_database() {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::new(dir.path().to_path_buf());
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        let start = date(2019, 1, 1);
        adapter.insert_prices("eur_usd", &generate_prices(start, 200, 0)).unwrap();
        adapter.insert_prices("gbp_usd", &generate_prices(start, 200, 1)).unwrap();

        let config = analysis_config(&["eur_usd", "gbp_usd"], dir.path().to_path_buf());
        let outcomes = pipeline::run_all(&adapter, &store, &config).unwrap();
        assert!(outcomes.iter().all(|(_, o)| !o.is_skipped()));

        let sample = store
            .load_sample(&ArtifactKey::aggregated(&config.tag, &Normalization::Global))
            .unwrap();
        assert_eq!(sample.len(), 2 * 199);
    }
}
