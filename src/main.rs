/**
 * Practise driving-test questions from the command line.
 */
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

use drivedrill::common::{is_broken_pipe, Command, Options, Result, ScopeOptions};
use drivedrill::iohelper::{print_error, print_json};
use drivedrill::quiz::{Scope, VehicleClass};
use drivedrill::{Config, Engine};

fn main() {
    init_logging();
    let options = Options::from_args();

    if let Err(e) = run(options) {
        if !is_broken_pipe(&e) {
            let _ = print_error(&e);
            ::std::process::exit(1);
        }
    }
}

/// Log to standard error, so that standard output stays valid JSON.
fn init_logging() {
    let filter = EnvFilter::try_from_env("DRIVEDRILL_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(options: Options) -> Result<()> {
    let mut config = Config::from_env();
    if let Some(data_dir) = options.data_dir {
        config = config.with_data_dir(data_dir);
    }
    if let Some(progress) = options.progress {
        config = config.with_progress_file(progress);
    }
    let mut engine = Engine::new(config)?;

    match options.cmd {
        Command::Vtypes => print_json(&engine.vehicle_types()?),
        Command::Random(options) => {
            let scope = resolve_scope(&options.scope)?;
            let result = engine.random(
                scope,
                options.count,
                options.category.as_deref(),
                options.exclude_done,
            )?;
            print_json(&result)
        }
        Command::Sequential(options) => {
            let scope = resolve_scope(&options.scope)?;
            print_json(&engine.sequential(scope, options.count, options.reset)?)
        }
        Command::Exam(options) => print_json(&engine.exam(resolve_scope(&options)?)?),
        Command::Check(options) => print_json(&engine.check(options.id, &options.answer)?),
        Command::Categories(options) => print_json(&engine.categories(resolve_scope(&options)?)?),
        Command::Stats => print_json(&engine.stats()?),
        Command::Wrong(options) => {
            let vehicle_class = resolve_optional(options.vtype.as_deref())?;
            print_json(&engine.wrong(vehicle_class, options.subject, options.count)?)
        }
        Command::Favorite(options) => print_json(&engine.favorite(options.id)?),
        Command::Unfavorite(options) => print_json(&engine.unfavorite(options.id)?),
        Command::Favorites(options) => {
            let vehicle_class = resolve_optional(options.vtype.as_deref())?;
            print_json(&engine.favorites(vehicle_class, options.subject, options.count)?)
        }
        Command::Top500(options) => {
            let scope = resolve_scope(&options.scope)?;
            print_json(&engine.top500(scope, options.count)?)
        }
        Command::Topics(options) => print_json(&engine.topics(resolve_scope(&options)?)?),
        Command::TopicPractice(options) => {
            let scope = resolve_scope(&options.scope)?;
            print_json(&engine.topic_practice(scope, &options.topic, options.count)?)
        }
        Command::Hard(options) => {
            let scope = resolve_scope(&options.scope)?;
            print_json(&engine.hard(scope, options.count)?)
        }
        Command::RecordExam(options) => {
            let scope = resolve_scope(&options.scope)?;
            print_json(&engine.record_exam(scope, options.score, options.total)?)
        }
    }
}

fn resolve_scope(options: &ScopeOptions) -> Result<Scope> {
    Ok(Scope::new(VehicleClass::from_alias(&options.vtype)?, options.subject))
}

fn resolve_optional(vtype: Option<&str>) -> Result<Option<VehicleClass>> {
    vtype.map(VehicleClass::from_alias).transpose()
}
