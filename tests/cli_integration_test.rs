//! CLI dispatch against real INI and CSV files on disk.

mod common;

use common::*;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use trendsim::adapters::csv_adapter::CsvMarketData;
use trendsim::adapters::file_config_adapter::FileConfigAdapter;
use trendsim::cli::{self, Command};
use trendsim::domain::backtest::run_backtest;
use trendsim::domain::error::TrendsimError;
use trendsim::domain::settings;

fn write_csv(dir: &Path, symbol: &str, closes: &[f64]) {
    let mut content = String::from("timestamp,open,high,low,close,volume\n");
    for bar in bars_from_closes(date(2024, 1, 1), closes) {
        writeln!(
            content,
            "{},{},{},{},{},{}",
            bar.date(),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume
        )
        .unwrap();
    }
    fs::write(dir.join(format!("{}.csv", symbol)), content).unwrap();
}

struct Workspace {
    _dir: TempDir,
    data: PathBuf,
    root: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        let data = root.join("bars");
        fs::create_dir(&data).unwrap();
        write_csv(&data, "AAA", &wave_closes(90));
        write_csv(&data, "BBB", &crash_closes());
        write_csv(&data, "SPY", &wave_closes(90));
        Workspace {
            _dir: dir,
            data,
            root,
        }
    }

    fn config(&self, name: &str, extra_backtest: &str) -> PathBuf {
        let ini = format!(
            r#"
[backtest]
symbols = aaa, bbb, missing
start_date = 2024-01-01
end_date = 2024-03-30
trailing_stop = 0.1
benchmark = spy
data_dir = {data}
{extra_backtest}

[strategy]
kind = ma_crossover
short = 2
long = 3

[regime]
enabled = false

[optimizer]
n_init = 2
n_iterations = 2
search = random
short_min = 2
short_max = 5
long_min = 8
long_max = 15
"#,
            data = self.data.display(),
        );
        let path = self.root.join(name);
        fs::write(&path, ini).unwrap();
        path
    }
}

mod commands {
    use super::*;

    #[test]
    fn validate_accepts_good_config() {
        let ws = Workspace::new();
        let config = ws.config("good.ini", "");
        cli::execute(Command::Validate { config }).unwrap();
    }

    #[test]
    fn backtest_skips_missing_symbol() {
        let ws = Workspace::new();
        let config = ws.config("good.ini", "");
        cli::execute(Command::Backtest {
            config: config.clone(),
            data_dir: None,
            json: false,
        })
        .unwrap();
        cli::execute(Command::Backtest {
            config,
            data_dir: None,
            json: true,
        })
        .unwrap();
    }

    #[test]
    fn backtest_abort_policy_surfaces_missing_symbol() {
        let ws = Workspace::new();
        let config = ws.config("abort.ini", "on_symbol_error = abort");
        let err = cli::execute(Command::Backtest {
            config,
            data_dir: None,
            json: false,
        })
        .unwrap_err();
        assert!(
            matches!(&err, TrendsimError::SymbolNotFound { symbol, .. } if symbol == "MISSING"),
            "{err}"
        );
    }

    #[test]
    fn data_dir_flag_overrides_config() {
        let ws = Workspace::new();
        let config = ws.config("abort.ini", "on_symbol_error = abort");
        let empty = ws.root.join("empty");
        fs::create_dir(&empty).unwrap();

        // AAA is the first symbol and does not exist in the override dir.
        let err = cli::execute(Command::Backtest {
            config,
            data_dir: Some(empty),
            json: false,
        })
        .unwrap_err();
        assert!(
            matches!(&err, TrendsimError::SymbolNotFound { symbol, .. } if symbol == "AAA"),
            "{err}"
        );
    }

    #[test]
    fn optimize_with_seed() {
        let ws = Workspace::new();
        let config = ws.config("good.ini", "");
        cli::execute(Command::Optimize {
            config,
            data_dir: None,
            seed: Some(11),
            json: true,
        })
        .unwrap();
    }

    #[test]
    fn symbols_lists_data_dir() {
        let ws = Workspace::new();
        cli::execute(Command::Symbols { data_dir: ws.data }).unwrap();
    }

    #[test]
    fn symbols_on_missing_dir_is_io_error() {
        let ws = Workspace::new();
        let err = cli::execute(Command::Symbols {
            data_dir: ws.root.join("nowhere"),
        })
        .unwrap_err();
        assert!(matches!(err, TrendsimError::Io(_)));
    }
}

mod config_errors {
    use super::*;

    #[test]
    fn missing_config_file() {
        let ws = Workspace::new();
        let err = cli::execute(Command::Validate {
            config: ws.root.join("absent.ini"),
        })
        .unwrap_err();
        assert!(matches!(err, TrendsimError::ConfigParse { .. }), "{err}");
    }

    #[test]
    fn negative_balance_is_rejected_before_any_fetch() {
        let ws = Workspace::new();
        let config = ws.config("bad.ini", "initial_balance = -1");
        let err = cli::execute(Command::Backtest {
            config,
            data_dir: None,
            json: false,
        })
        .unwrap_err();
        assert!(
            matches!(&err, TrendsimError::ConfigInvalid { key, .. } if key == "initial_balance"),
            "{err}"
        );
    }

    #[test]
    fn loaded_request_matches_file() {
        let ws = Workspace::new();
        let config = ws.config("good.ini", "");
        let adapter = FileConfigAdapter::from_file(&config).unwrap();

        let request = settings::load_backtest_request(&adapter).unwrap();
        assert_eq!(request.symbols, vec!["AAA", "BBB", "MISSING"]);
        assert_eq!(request.trailing_stop, 0.1);
        assert_eq!(request.benchmark.as_deref(), Some("SPY"));
        assert_eq!(settings::data_dir(&adapter), ws.data);

        let space = settings::load_parameter_space(&adapter).unwrap();
        let bounds: Vec<(f64, f64)> = space.dims().iter().map(|d| (d.low, d.high)).collect();
        assert_eq!(bounds, vec![(2.0, 5.0), (8.0, 15.0)]);
    }
}

mod json_output {
    use super::*;

    #[test]
    fn crossover_report_serializes_strategy_and_trades() {
        let ws = Workspace::new();
        let config = ws.config("good.ini", "");
        let adapter = FileConfigAdapter::from_file(&config).unwrap();
        let request = settings::load_backtest_request(&adapter).unwrap();
        let report = run_backtest(&CsvMarketData::new(ws.data.clone()), &request).unwrap();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["strategy"]["strategy"], "ma_crossover");
        assert_eq!(json["strategy"]["short"], 2);
        assert_eq!(json["strategy"]["long"], 3);
        assert_eq!(json["strategy"]["kind"], "simple");
        assert_eq!(json["final_balance"], report.final_balance);
        assert_eq!(json["skipped"][0]["symbol"], "MISSING");
        assert_eq!(json["skipped"][0]["reason"]["kind"], "not_found");

        let text = serde_json::to_string(&report).unwrap();
        assert!(text.contains(r#""strategy":{"strategy":"ma_crossover""#), "{text}");
    }
}
