use std::sync::Arc;

use chrono::Local;
use tokio::sync::broadcast::{Receiver, error::TryRecvError};
use tracing::{info, instrument};

use super::{
    MonitorArgs,
    formatting::{format_attempts, format_error, format_event, format_topology},
};
use crate::{
    Result,
    config::Config,
    mixer::{BackendRegistry, Context, ContextError, ContextEvent, State},
};

const APP_NAME: &str = "mixlayer monitor";
const APP_ID: &str = "org.mixlayer.Monitor";

/// Connect, print the topology and follow events until Ctrl-C.
///
/// # Errors
/// Returns error if the configuration cannot be loaded or no backend
/// reaches the ready state.
#[instrument(skip_all)]
pub async fn run(args: &MonitorArgs, config: &Config) -> Result<()> {
    let mut context = Context::new(Arc::new(BackendRegistry::with_builtin()));
    context.configure(config)?;

    if let Some(backend_type) = args.backend {
        context.set_backend_type(backend_type)?;
    }
    if let Some(server) = args.server.as_deref() {
        context.set_server_address(Some(server))?;
    }
    if context.app_info().name.is_none() {
        context.set_app_name(Some(APP_NAME))?;
        context.set_app_id(Some(APP_ID))?;
        context.set_app_version(Some(env!("CARGO_PKG_VERSION")))?;
    }

    let mut events = context.subscribe();

    if let Err(err) = context.open() {
        eprintln!("{}", format_error(&err.to_string()));
        eprintln!("{}", format_attempts(context.connection_attempts()));
        return Err(err.into());
    }

    let state = context.wait_until_settled().await;
    if state != State::Ready {
        eprintln!("{}", format_attempts(context.connection_attempts()));
        return Err(ContextError::NotReady(state).into());
    }

    print!("{}", format_topology(&context));
    if args.once {
        context.close();
        return Ok(());
    }

    drain(&mut events);
    info!("Following context events, press Ctrl-C to stop");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let alive = tokio::select! {
            _ = &mut shutdown => false,
            alive = context.dispatch() => alive,
        };
        print_events(&mut events);
        if !alive {
            break;
        }
    }

    context.close();
    print_events(&mut events);
    Ok(())
}

fn print_events(events: &mut Receiver<ContextEvent>) {
    loop {
        match events.try_recv() {
            Ok(event) => println!("{} {}", Local::now().format("%H:%M:%S%.3f"), format_event(&event)),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
}

fn drain(events: &mut Receiver<ContextEvent>) {
    while !matches!(events.try_recv(), Err(TryRecvError::Empty | TryRecvError::Closed)) {}
}
