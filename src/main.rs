use std::time::Duration;

use clap::Parser;

use gridcells::config::{DEFAULT_GRID_SIZE, GridConfig, Stage};

#[derive(Parser, Debug)]
#[command(name = "gridcells", version)]
struct Cli {
    /// Drawing stage: clear, square, grid or cells.
    #[arg(long, default_value_t = Stage::Cells)]
    stage: Stage,

    /// Number of cells per side of the grid.
    #[arg(long, default_value_t = DEFAULT_GRID_SIZE)]
    grid_size: u32,

    /// Period between state swaps in the cells stage (e.g. `200ms`, `1s`).
    #[arg(long, value_parser = humantime::parse_duration, default_value = "200ms")]
    interval: Duration,
}

impl Cli {
    fn into_config(self) -> GridConfig {
        GridConfig {
            stage: self.stage,
            grid_size: self.grid_size,
            update_interval: self.interval,
            canvas_id: None,
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Cli::parse().into_config();
    gridcells::run(config)
}

// The web build is driven from JavaScript through the library's exports
#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_library_defaults() {
        let cli = Cli::try_parse_from(["gridcells"]).unwrap();
        assert_eq!(cli.into_config(), GridConfig::default());
    }

    #[test]
    fn parses_stage_and_interval() {
        let cli = Cli::try_parse_from([
            "gridcells",
            "--stage",
            "grid",
            "--grid-size",
            "8",
            "--interval",
            "1s",
        ])
        .unwrap();
        let config = cli.into_config();
        assert_eq!(config.stage, Stage::Grid);
        assert_eq!(config.grid_size, 8);
        assert_eq!(config.update_interval, Duration::from_secs(1));
    }

    #[test]
    fn rejects_unknown_stage() {
        assert!(Cli::try_parse_from(["gridcells", "--stage", "life"]).is_err());
    }
}
