use std::{
    ffi::OsString,
    io::{self, Write},
    path::PathBuf,
};

use auction_gateway_client::{
    identity::IdentityError,
    org::InvalidOrg,
    profile::ProfileError,
    FileProfileResolver, Gateway, IdentityStore, MeasurementLog, NetworkProfileResolver, OrgTag,
    Payload, TimedInvoker, TransactionClient, TransactionError, WalletIdentityStore,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    config::{ConfigError, Options},
    params::{Command, Params},
};

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

/// Every failure that ends a run. [`AppError::exit_code`] is the only place
/// that decides the process exit status.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Arguments(#[from] clap::Error),

    #[error("{source}")]
    InvalidOrg {
        source: InvalidOrg,
        usage: &'static str,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("FAILED to submit {operation}: {source}")]
    Submit {
        operation: &'static str,
        source: SubmitError,
    },

    #[error("Failed to write output: {0}")]
    Output(#[from] io::Error),
}

impl AppError {
    pub fn exit_code(&self) -> u8 {
        match self {
            // --help and --version come through clap's error path
            AppError::Arguments(e) if !e.use_stderr() => 0,
            _ => 1,
        }
    }

    /// Usage text goes to `out`, error messages to `err`.
    pub fn report(&self, out: &mut impl Write, err: &mut impl Write) {
        let written = match self {
            AppError::Arguments(e) => write!(out, "{}", e.render()),
            AppError::InvalidOrg { source, usage } => {
                writeln!(out, "{usage}").and_then(|()| writeln!(err, "{source}"))
            }
            AppError::Config(e) => writeln!(err, "{e}"),
            AppError::Submit { .. } => writeln!(err, "******** {self}"),
            AppError::Output(_) => writeln!(err, "{self}"),
        };
        if let Err(e) = written {
            warn!("Failed to report \"{self}\": {e}");
        }
    }
}

/// Runs one command line to completion and returns the process exit code.
///
/// Arguments and the org are checked before `read_config` is called.
pub async fn run<A, T, G>(
    args: A,
    read_config: impl FnOnce() -> Result<Options, ConfigError>,
    gateway: G,
    out: &mut impl Write,
    err: &mut impl Write,
) -> u8
where
    A: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    G: Gateway,
{
    match execute(args, read_config, gateway, out, err).await {
        Ok(()) => 0,
        Err(e) => {
            e.report(out, err);
            e.exit_code()
        }
    }
}

async fn execute<A, T, G>(
    args: A,
    read_config: impl FnOnce() -> Result<Options, ConfigError>,
    gateway: G,
    out: &mut impl Write,
    err: &mut impl Write,
) -> Result<(), AppError>
where
    A: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    G: Gateway,
{
    let command = Params::try_parse(args)?.command;

    let org: OrgTag = command
        .org()
        .parse()
        .map_err(|source| AppError::InvalidOrg {
            source,
            usage: command.usage(),
        })?;

    let options = read_config()?;
    info!(?options, "starting");

    App::from_options(options, gateway)
        .dispatch(org, &command, out, err)
        .await
}

pub struct App<G, I, P> {
    client: TransactionClient<G>,
    identities: I,
    profiles: P,
    channel: String,
    contract: String,
    measure_dir: PathBuf,
}

impl<G: Gateway> App<G, WalletIdentityStore, FileProfileResolver> {
    pub fn from_options(options: Options, gateway: G) -> Self {
        App {
            client: TransactionClient::new(gateway, options.connect)
                .with_timeout(options.submit_timeout),
            identities: WalletIdentityStore::new(options.wallet_dir),
            profiles: FileProfileResolver::new(options.org1_profile, options.org2_profile),
            channel: options.channel,
            contract: options.contract,
            measure_dir: options.measure_dir,
        }
    }
}

impl<G, I, P> App<G, I, P>
where
    G: Gateway,
    I: IdentityStore,
    P: NetworkProfileResolver,
{
    /// Submits `command` as `org` and prints the committed result.
    pub async fn dispatch(
        &self,
        org: OrgTag,
        command: &Command,
        out: &mut impl Write,
        err: &mut impl Write,
    ) -> Result<(), AppError> {
        let operation = command.function_name();
        let invoker = TimedInvoker::new(MeasurementLog::new(
            self.measure_dir.join(command.measurement_file()),
        ));

        writeln!(out, "\n--> Submit Transaction: {operation}")?;
        let (result, measurement) = invoker
            .invoke(operation, self.submit(org, command))
            .await;

        match measurement {
            Ok(measurement) => info!(
                "{operation} took {:.3}s",
                measurement.elapsed_seconds()
            ),
            Err(e) => {
                warn!("{e}");
                if let Err(write_err) = writeln!(err, "{e}") {
                    warn!("Failed to report measurement failure: {write_err}");
                }
            }
        }

        let payload = result.map_err(|source| AppError::Submit { operation, source })?;
        writeln!(out, "*** Result: committed {payload}")?;
        Ok(())
    }

    async fn submit(&self, org: OrgTag, command: &Command) -> Result<Payload, SubmitError> {
        let identity = self.identities.resolve(org, command.user())?;
        let profile = self.profiles.resolve(org)?;
        let request = command.request();

        Ok(self
            .client
            .submit(&profile, &identity, &self.channel, &self.contract, &request)
            .await?)
    }
}
