mod parsers;
mod signer;

use anyhow::Result;
use clap::{Parser, Subcommand};
use multisig_wallet_sdk::{
    AccountId, CallHash, CancelSignal, EncodedCall, Network, QueuePass, TransferIntent,
    WalletClient,
};

use crate::parsers::{parse_amount, parse_multisig};
use crate::signer::DevSigner;

#[derive(Debug, Parser)]
#[command(name = "multisig-wallet", version, about, long_about = None)]
struct App {
    /// Network to operate on
    #[arg(long, global = true, default_value = "polkadot")]
    network: Network,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(name = "address", about = "Print the dev signer address for a phrase")]
    Address {
        #[arg(long)]
        phrase: String,
    },
    #[command(name = "derive", about = "Derive a multisig address from signatories and threshold")]
    Derive {
        #[arg(long, required = true)]
        signatories: Vec<String>,
        #[arg(long)]
        threshold: u16,
    },
    #[command(name = "queue", about = "List the pending proposal queue for a multisig address")]
    Queue {
        #[arg(long)]
        multisig: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        page_size: u32,
    },
    #[command(name = "send", about = "Propose or approve a transfer from the multisig")]
    Send {
        #[arg(long, required = true)]
        signatories: Vec<String>,
        #[arg(long)]
        threshold: u16,
        #[arg(long)]
        recipient: String,
        /// Amount in display units, e.g. "1.5"
        #[arg(long)]
        amount: String,
        /// Allow the multisig account to be reaped below the existential
        /// deposit
        #[arg(long)]
        allow_death: bool,
        #[arg(long)]
        phrase: String,
    },
    #[command(name = "approve", about = "Approve an existing call hash")]
    Approve {
        #[arg(long, required = true)]
        signatories: Vec<String>,
        #[arg(long)]
        threshold: u16,
        #[arg(long)]
        call_hash: String,
        /// Full call bytes, required when this approval executes and the
        /// indexer never surfaced them
        #[arg(long)]
        call_data: Option<String>,
        #[arg(long)]
        phrase: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let app = App::parse();
    let client = WalletClient::new(app.network);
    let prefix = client.properties().address_prefix;

    match app.command {
        Commands::Address { phrase } => {
            use multisig_wallet_sdk::Signer;
            let signer = DevSigner::from_phrase(&phrase);
            println!("{}", signer.address().to_ss58(prefix));
        }
        Commands::Derive {
            signatories,
            threshold,
        } => {
            let account = parse_multisig(&signatories, threshold)?;
            println!("{}", account.address().to_ss58(prefix));
        }
        Commands::Queue {
            multisig,
            page,
            page_size,
        } => {
            let address: AccountId = multisig.parse()?;
            let pass = client
                .pending_queue(&address, page, page_size, &CancelSignal::never())
                .await?;
            match pass {
                QueuePass::Cancelled => {}
                QueuePass::Completed {
                    proposals,
                    failures,
                } => {
                    if proposals.is_empty() && failures.is_empty() {
                        println!("No pending transactions in the queue");
                    }
                    for proposal in &proposals {
                        println!("{proposal}");
                    }
                    for failure in &failures {
                        eprintln!("warning: skipped {}: {}", failure.call_hash, failure.error);
                    }
                }
            }
        }
        Commands::Send {
            signatories,
            threshold,
            recipient,
            amount,
            allow_death,
            phrase,
        } => {
            let account = parse_multisig(&signatories, threshold)?;
            let recipient: AccountId = recipient.parse()?;
            let amount = parse_amount(&amount, app.network)?;
            let intent = if allow_death {
                TransferIntent::allow_death(recipient, amount)
            } else {
                TransferIntent::keep_alive(recipient, amount)
            };
            let signer = DevSigner::from_phrase(&phrase);
            let submission = client.send_transfer(&account, &intent, &signer).await?;
            println!(
                "{:?} for call {} (extrinsic {})",
                submission.kind, submission.call_hash, submission.extrinsic_hash
            );
        }
        Commands::Approve {
            signatories,
            threshold,
            call_hash,
            call_data,
            phrase,
        } => {
            let account = parse_multisig(&signatories, threshold)?;
            let call_hash: CallHash = call_hash.parse()?;
            let call_data = call_data.as_deref().map(EncodedCall::from_hex).transpose()?;
            let signer = DevSigner::from_phrase(&phrase);
            let submission = client
                .approve(&account, call_hash, call_data, &signer)
                .await?;
            println!(
                "{:?} for call {} (extrinsic {})",
                submission.kind, submission.call_hash, submission.extrinsic_hash
            );
        }
    }

    Ok(())
}
