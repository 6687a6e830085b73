use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use trendline::date_util::{format_timestamp, parse_timestamp};
use trendline::{
    AggregateKind, Dialect, IntervalUnit, MetricQuery, MetricsConfig, Period, PreviousKind,
    ProjectionModel, Projections, TrendSeries,
};

#[derive(Parser)]
#[command(name = "trendline", about = "Time-bucketed metrics over a SQLite table")]
struct Cli {
    /// Database path (default: ~/.trendline/trendline.db)
    #[arg(long)]
    db: Option<String>,

    /// Config file (default: $TRENDLINE_CONFIG, then <config dir>/trendline/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate over the whole range
    Value(QueryArgs),
    /// Bucketed series over the range
    Trends(QueryArgs),
    /// Print the SQL a query would run
    Sql {
        #[command(flatten)]
        args: QueryArgs,
        /// Target dialect: sqlite, postgres, mysql (default: from config)
        #[arg(long)]
        dialect: Option<String>,
        /// Print the value statement instead of the trend statement
        #[arg(long)]
        value: bool,
    },
}

#[derive(Args)]
struct QueryArgs {
    /// Table to aggregate
    table: String,
    /// Aggregate: count, sum, avg, min, max
    #[arg(long, default_value = "count")]
    aggregate: String,
    /// Aggregated column (default: from config)
    #[arg(long)]
    column: Option<String>,
    /// Timestamp column (default: from config)
    #[arg(long)]
    date_column: Option<String>,
    /// Bucket interval: second, minute, hour, day, day_of_week, week, month, year
    #[arg(long, default_value = "day")]
    interval: String,
    /// Units per bucket
    #[arg(long, default_value_t = 1)]
    step: u32,
    /// Named range, e.g. last_30_days, month_to_date, previous_year
    #[arg(long, conflicts_with_all = ["from", "all"])]
    period: Option<String>,
    /// Range start (YYYY-MM-DD or YYYY-MM-DD HH:MM:SS)
    #[arg(long, conflicts_with = "all")]
    from: Option<String>,
    /// Range end (default: now)
    #[arg(long, requires = "from")]
    to: Option<String>,
    /// From the earliest row
    #[arg(long)]
    all: bool,
    /// Column or SQL expression to partition by
    #[arg(long)]
    group_by: Option<String>,
    /// Raw SQL predicate (repeatable)
    #[arg(long)]
    filter: Vec<String>,
    /// Emit empty buckets, optionally with a fill value
    #[arg(long, num_args = 0..=1, value_name = "VALUE")]
    fill: Option<Option<i64>>,
    /// Compare with the preceding period
    #[arg(long)]
    previous: bool,
    /// Bucket values as a percentage of the total
    #[arg(long)]
    percent: bool,
    /// Project when the cumulative total reaches this value
    #[arg(long)]
    project_when: Option<f64>,
    /// Project the cumulative total at this date
    #[arg(long)]
    project_for_date: Option<String>,
    /// Projection model: weighted_rate, decayed_average
    #[arg(long)]
    model: Option<String>,
    /// Decimal places for fractional results
    #[arg(long)]
    precision: Option<u32>,
    /// Evaluate relative ranges as of this timestamp
    #[arg(long)]
    now: Option<String>,
    /// Output JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = match &cli.config {
        Some(path) => MetricsConfig::load_from(path)?,
        None => MetricsConfig::load()?,
    };

    match cli.command {
        Commands::Sql {
            args,
            dialect,
            value,
        } => {
            let dialect = dialect
                .as_deref()
                .map(Dialect::from_name)
                .unwrap_or(config.dialect);
            let query = build_query(&args, &config)?;
            let sql = if value {
                query.value_sql(dialect)?
            } else {
                query.trends_sql(dialect)?
            };
            println!("{sql}");
        }
        Commands::Value(args) => {
            let db = open_db(cli.db.as_deref()).await?;
            let query = build_query(&args, &config)?;
            let metric = db.value(query).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&metric)?);
            } else {
                println!("{}", metric.value);
                if let Some(ref groups) = metric.groups {
                    for (key, value) in groups {
                        println!("  {key}: {value}");
                    }
                }
                if let Some(ref previous) = metric.previous {
                    let kind = match previous.kind {
                        PreviousKind::Increase => "increase",
                        PreviousKind::Decrease => "decrease",
                        PreviousKind::Identical => "identical",
                    };
                    println!(
                        "Previous: {} ({kind} of {}, {}%)",
                        previous.value, previous.difference, previous.percentage
                    );
                }
            }
        }
        Commands::Trends(args) => {
            let db = open_db(cli.db.as_deref()).await?;
            let query = build_query(&args, &config)?;
            let series = db.trends(query, args.percent).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&series)?);
            } else {
                print_series(&series, "");
            }
        }
    }
    Ok(())
}

async fn open_db(path: Option<&str>) -> anyhow::Result<trendline::Database> {
    Ok(match path {
        Some(path) => trendline::Database::open_at(path).await?,
        None => trendline::Database::open().await?,
    })
}

fn build_query(args: &QueryArgs, config: &MetricsConfig) -> anyhow::Result<MetricQuery> {
    let kind = AggregateKind::parse(&args.aggregate)?;
    let interval = IntervalUnit::parse(&args.interval)?;
    let column = args.column.as_deref().unwrap_or(&config.column);

    let mut query = MetricQuery::new(&args.table)
        .with_config(config)
        .aggregate(kind, column)
        .by(interval, args.step)
        .with_previous(args.previous);

    if let Some(ref now) = args.now {
        query = query.at(parse_timestamp(now)?);
    }
    if let Some(ref column) = args.date_column {
        query = query.date_column(column);
    }

    if let Some(ref period) = args.period {
        query = query.for_period(Period::parse(period)?);
    } else if let Some(ref from) = args.from {
        let from = parse_timestamp(from)?;
        query = match args.to {
            Some(ref to) => query.between(from, parse_timestamp(to)?),
            None => query.from(from),
        };
    }
    query = query.when(args.all, MetricQuery::all);

    if let Some(ref group) = args.group_by {
        query = query.group_by(group);
    }
    for predicate in &args.filter {
        query = query.filter(predicate);
    }
    query = match args.fill {
        Some(Some(value)) => query.fill_missing_with(value),
        Some(None) => query.fill_missing(),
        None => query,
    };

    if let Some(target) = args.project_when {
        query = query.project_when(target);
    }
    if let Some(ref date) = args.project_for_date {
        query = query.project_for_date(parse_timestamp(date)?);
    }
    if let Some(ref model) = args.model {
        let model = ProjectionModel::parse(model).ok_or_else(|| {
            anyhow::anyhow!("Unknown projection model: {model}. Use: weighted_rate, decayed_average")
        })?;
        query = query.projection_model(model);
    }
    if let Some(precision) = args.precision {
        query = query.precision(precision);
    }
    Ok(query)
}

fn print_series(series: &TrendSeries, indent: &str) {
    for (label, value) in series.assoc() {
        println!("{indent}{label}  {value}");
    }
    println!("{indent}Total: {}", series.total);
    print_projections(&series.projections, indent);

    if let Some(ref groups) = series.groups {
        for (key, group) in groups {
            println!();
            println!("{indent}[{key}]");
            print_series(group, &format!("{indent}  "));
        }
    }
}

fn print_projections(projections: &Projections, indent: &str) {
    if let Some(ref when) = projections.when {
        let date = when
            .projected_date
            .map(format_timestamp)
            .unwrap_or_else(|| "never".into());
        println!(
            "{indent}Reaches {}: {date} (confidence {}%)",
            when.target_value, when.confidence
        );
    }
    if let Some(ref at) = projections.date {
        let total = at
            .projected_total
            .map(|t| t.to_string())
            .unwrap_or_else(|| "n/a".into());
        println!(
            "{indent}At {}: {total} (confidence {}%)",
            format_timestamp(at.target_date),
            at.confidence
        );
    }
}
