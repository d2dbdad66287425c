use anyhow::{Context, anyhow, bail};
use chrono::{Local, NaiveDate};

use matchday_predict::api::ApiClient;
use matchday_predict::cancel::CancelToken;
use matchday_predict::config::{self, AppConfig};
use matchday_predict::logging;
use matchday_predict::predict;
use matchday_predict::present::ResultView;
use matchday_predict::selection::{HistoryMode, Selection};

const USAGE: &str = "usage: predict_once <league> <home> <away> [--season S] [--date YYYY-MM-DD] [--last-n N | --last-days N]";

fn parse_args(cfg: &AppConfig, args: &[String]) -> anyhow::Result<Selection> {
    let mut positional = Vec::new();
    let mut selection = Selection::new(
        Local::now().date_naive(),
        cfg.history_mode,
        cfg.history_value,
    );

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut value = |name: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| anyhow!("{name} needs a value\n{USAGE}"))
        };
        match arg.as_str() {
            "--season" => selection.season = Some(value("--season")?),
            "--date" => {
                let raw = value("--date")?;
                let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                    .with_context(|| format!("--date must be YYYY-MM-DD, got {raw}"))?;
                selection.cutoff_date = Some(date);
            }
            "--last-n" | "--last-days" => {
                let raw = value(arg.as_str())?;
                let n = raw
                    .parse::<u32>()
                    .with_context(|| format!("{arg} must be a positive integer, got {raw}"))?;
                selection.history_mode = if arg == "--last-n" {
                    HistoryMode::LastN
                } else {
                    HistoryMode::LastDays
                };
                selection.history_value = n.max(1);
            }
            "-h" | "--help" => bail!(USAGE),
            other if other.starts_with("--") => bail!("unknown flag {other}\n{USAGE}"),
            other => positional.push(other.to_string()),
        }
    }

    let [league, home, away]: [String; 3] = positional
        .try_into()
        .map_err(|_| anyhow!(USAGE))?;
    selection.league = league;
    selection.home_team = home;
    selection.away_team = away;
    Ok(selection)
}

fn main() -> anyhow::Result<()> {
    config::load_dotenv();
    let _ = logging::init_stderr();
    let cfg = AppConfig::from_env();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let selection = parse_args(&cfg, &args)?;
    let api = ApiClient::from_config(&cfg)?;

    let result = predict::build_and_submit(&api, &selection, &CancelToken::new(0))
        .map_err(|err| anyhow!(err.user_message()))?;

    println!(
        "{} | {} vs {}",
        selection.league, selection.home_team, selection.away_team
    );
    for (label, value) in ResultView::from(&result).rows() {
        println!("{label:<17}{value}");
    }
    Ok(())
}
