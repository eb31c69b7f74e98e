//! `duploctl` binary entrypoint.

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use duplo_cli::cli::{self, Invocation};
use duplo_cli::{ApiTenants, HttpTransport, Settings, output};
use duplo_core::{ClientContext, Dispatcher, DuploError, Transport};

fn main() -> ExitCode {
    let tokens: Vec<String> = std::env::args().skip(1).collect();
    match run(tokens) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report(&err),
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(tokens: Vec<String>) -> anyhow::Result<()> {
    let registry = cli::bootstrap()?;
    let (globals, rest) = cli::parse_globals(&registry, tokens)?;
    let mut settings = Settings::from_args(&globals)?;
    init_tracing(&settings.log_level);

    let mut stdout = io::stdout().lock();
    match Invocation::from_tokens(rest)? {
        Invocation::Overview => write!(stdout, "{}", cli::overview(&registry)?)?,
        Invocation::Describe(resource) => write!(stdout, "{}", cli::describe(&registry, &resource)?)?,
        Invocation::Run {
            resource,
            command,
            args,
        } => {
            let args = registry.parse_command(&resource, &command, args)?;
            settings.apply_context_file()?;
            settings.validate()?;

            let (host, token) = (
                settings.host.as_deref().unwrap_or_default(),
                settings.token.as_deref().unwrap_or_default(),
            );
            let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(host, token)?);
            let tenants = Arc::new(ApiTenants::new(Arc::clone(&transport)));
            let client = Arc::new(ClientContext::new(
                transport,
                tenants,
                settings.client_settings(),
            ));

            let result = Dispatcher::new(&registry, client).invoke(&resource, &command, &args)?;
            let result = match &settings.query {
                Some(query) => output::query(&result, query)?,
                None => result,
            };
            output::write(&mut stdout, &result, settings.output)?;
        }
    }
    stdout.flush()?;
    Ok(())
}

fn report(err: &anyhow::Error) -> ExitCode {
    let Some(err) = err.downcast_ref::<DuploError>() else {
        eprintln!("Error: an unexpected error occurred: {err}");
        return ExitCode::FAILURE;
    };

    if let DuploError::HelpRequested(text) = err {
        print!("{text}");
        return ExitCode::SUCCESS;
    }

    eprintln!("Error: {err}");
    if let Some(hint) = err.usage_hint() {
        eprintln!("Usage: {hint}");
    }
    ExitCode::from(err.exit_code())
}
