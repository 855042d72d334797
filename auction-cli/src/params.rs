use std::ffi::OsString;

use auction_gateway_client::TransactionRequest;
use clap::{Parser, Subcommand};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "auction-cli", about)]
pub struct Params {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Scores a seller after an auction.
    UpdateRating {
        /// Organization of the submitting user: Org1 or Org2.
        org: String,
        /// Wallet label of the submitting user.
        user: String,
        /// Rating given to the seller.
        #[arg(value_parser = parse_score, allow_negative_numbers = true)]
        score: String,
        /// Seller being rated.
        target: String,
    },
    /// Settles an auction and withdraws the user's allocation.
    Withdraw {
        /// Organization of the submitting user: Org1 or Org2.
        org: String,
        /// Wallet label of the submitting user.
        user: String,
        /// Auction to withdraw from.
        auction_id: String,
    },
}

/// The contract parses the score as a float, so reject anything else up front.
/// The original text is kept and submitted as typed.
fn parse_score(arg: &str) -> Result<String, String> {
    match arg.parse::<f64>() {
        Ok(score) if score.is_finite() => Ok(arg.to_owned()),
        _ => Err(format!("score must be a finite number, got {arg:?}")),
    }
}

impl Params {
    pub fn try_parse<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let params = <Self as Parser>::try_parse_from(args)?;
        debug!("Starting with the following parameters:\n {params:#?}");
        Ok(params)
    }
}

impl Command {
    pub fn org(&self) -> &str {
        match self {
            Command::UpdateRating { org, .. } | Command::Withdraw { org, .. } => org,
        }
    }

    pub fn user(&self) -> &str {
        match self {
            Command::UpdateRating { user, .. } | Command::Withdraw { user, .. } => user,
        }
    }

    /// Contract function name, also used as the measurement label.
    pub fn function_name(&self) -> &'static str {
        match self {
            Command::UpdateRating { .. } => "UpdateRating",
            Command::Withdraw { .. } => "Withdraw",
        }
    }

    pub fn measurement_file(&self) -> &'static str {
        match self {
            Command::UpdateRating { .. } => "measure_score.txt",
            Command::Withdraw { .. } => "measure_withdraw.txt",
        }
    }

    pub fn usage(&self) -> &'static str {
        match self {
            Command::UpdateRating { .. } => "Usage: auction-cli update-rating org userID score sellerID",
            Command::Withdraw { .. } => "Usage: auction-cli withdraw org userID auctionID",
        }
    }

    pub fn request(&self) -> TransactionRequest {
        let arguments = match self {
            Command::UpdateRating {
                user,
                score,
                target,
                ..
            } => vec![score.clone(), user.clone(), target.clone()],
            Command::Withdraw {
                user, auction_id, ..
            } => vec![auction_id.clone(), user.clone()],
        };
        TransactionRequest::new(self.function_name(), arguments)
    }
}
