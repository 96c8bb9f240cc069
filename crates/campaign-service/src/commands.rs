//! Subcommand implementations.

use campaign_core::CampaignEngine;
use campaign_types::{
	current_timestamp, decimal_to_minor, short_address, Campaign, CampaignDraft, InvalidInput,
	TransactionRecord, TransactionStatus,
};
use std::error::Error;
use std::path::PathBuf;

type CommandResult = Result<(), Box<dyn Error>>;

const SECONDS_PER_DAY: u64 = 86_400;

pub enum ImageSource {
	Uri(String),
	File(PathBuf),
}

pub struct CreateRequest {
	pub title: String,
	pub description: String,
	pub price: String,
	pub image: ImageSource,
	pub days: u64,
}

/// Restores the wallet session, asking for access only when none exists.
async fn ready(engine: &CampaignEngine) -> CommandResult {
	let state = engine.initialize().await?;
	if !state.connected {
		engine.connect().await?;
	}
	Ok(())
}

pub async fn status(engine: &CampaignEngine) -> CommandResult {
	let state = engine.initialize().await?;
	let expected = engine.guard().expected();
	let network = engine.guard().status();

	println!("Network:  {} ({})", expected.name, expected.chain_id);
	match &state.address {
		Some(address) if state.connected => println!("Account:  {}", short_address(address)),
		_ => println!("Account:  not connected"),
	}
	match network.current_chain_id {
		Some(chain_id) if network.is_valid => println!("Chain:    {} (ok)", chain_id),
		Some(chain_id) => println!("Chain:    {} ({})", chain_id, expected.mismatch_hint()),
		None => println!("Chain:    unknown"),
	}
	println!(
		"Contract: {} ({})",
		engine.config().contract.address,
		if engine.gateway().is_bound() {
			"bound"
		} else {
			"not initialized"
		}
	);
	Ok(())
}

pub async fn connect(engine: &CampaignEngine) -> CommandResult {
	let address = engine.connect().await?;
	println!("Connected {}", address);
	if !engine.guard().status().is_valid {
		println!("{}", engine.guard().expected().mismatch_hint());
	}
	Ok(())
}

pub async fn switch_network(engine: &CampaignEngine) -> CommandResult {
	ready(engine).await?;
	let status = engine.switch_network().await?;
	println!(
		"Active chain: {}",
		status
			.current_chain_id
			.map(|id| id.to_string())
			.unwrap_or_else(|| "unknown".to_string())
	);
	Ok(())
}

pub async fn list(engine: &CampaignEngine, closed: bool, json: bool) -> CommandResult {
	ready(engine).await?;
	if !engine.gateway().is_bound() {
		return Err(engine.guard().expected().mismatch_hint().into());
	}
	if engine.cache().is_stale() {
		engine.cache().refresh().await?;
	}

	let now = current_timestamp();
	let campaigns = if closed {
		engine.cache().get_closed(now)
	} else {
		engine.cache().get_open(now)
	};

	if json {
		println!("{}", serde_json::to_string_pretty(&campaigns)?);
		return Ok(());
	}
	if campaigns.is_empty() {
		println!("No {} campaigns", if closed { "closed" } else { "open" });
		return Ok(());
	}

	let symbol = &engine.config().network.native_currency.symbol;
	for campaign in &campaigns {
		println!("{}", format_row(campaign, symbol));
	}
	Ok(())
}

fn format_row(campaign: &Campaign, symbol: &str) -> String {
	let deadline = chrono::DateTime::from_timestamp(campaign.deadline as i64, 0)
		.map(|at| at.format("%Y-%m-%d").to_string())
		.unwrap_or_else(|| campaign.deadline.to_string());
	format!(
		"#{:<4} {:<32} {} / {} {} ({:.1}%)  until {}  by {}",
		campaign.id,
		campaign.title,
		campaign.amount_collected.normalize(),
		campaign.target_amount.normalize(),
		symbol,
		campaign.progress_percent(),
		deadline,
		short_address(&campaign.owner)
	)
}

/// Unix deadline `days` after `now`.
fn deadline_after(now: u64, days: u64) -> Result<u64, InvalidInput> {
	days.checked_mul(SECONDS_PER_DAY)
		.and_then(|seconds| now.checked_add(seconds))
		.ok_or(InvalidInput::DurationOutOfRange { days })
}

pub async fn create(engine: &CampaignEngine, request: CreateRequest) -> CommandResult {
	let decimals = engine.config().network.native_currency.decimals;
	let target_minor = decimal_to_minor(&request.price, decimals)?;
	let deadline = deadline_after(current_timestamp(), request.days)?;

	ready(engine).await?;
	let image_ref = match request.image {
		ImageSource::Uri(uri) => uri,
		ImageSource::File(path) => {
			let uri = engine.upload_image(&path).await?;
			println!("Uploaded {} to {}", path.display(), uri);
			uri
		},
	};

	let draft = CampaignDraft {
		title: request.title,
		description: request.description,
		target_minor,
		deadline,
		image_ref,
	};
	let ticket = engine.orchestrator().create_campaign(draft).await?;
	report(engine, ticket.wait().await)
}

pub async fn donate(engine: &CampaignEngine, campaign_id: u64, amount: &str) -> CommandResult {
	let decimals = engine.config().network.native_currency.decimals;
	let amount_minor = decimal_to_minor(amount, decimals)?;

	ready(engine).await?;
	let ticket = engine.orchestrator().donate(campaign_id, amount_minor).await?;
	report(engine, ticket.wait().await)
}

fn report(engine: &CampaignEngine, record: TransactionRecord) -> CommandResult {
	match (record.status, record.error) {
		(TransactionStatus::Confirmed, _) => {
			let block = record.block_number.unwrap_or_default();
			match (record.hash, engine.config().network.explorer_urls.first()) {
				(Some(hash), Some(explorer)) => {
					println!("Confirmed in block {}: {}/tx/{}", block, explorer, hash)
				},
				_ => println!("Confirmed in block {}", block),
			}
			Ok(())
		},
		(_, Some(error)) => Err(error.into()),
		(status, None) => Err(format!("Transaction ended in {:?}", status).into()),
	}
}

pub async fn watch(engine: &CampaignEngine) -> CommandResult {
	if let Err(e) = ready(engine).await {
		tracing::warn!(error = %e, "Watching without a connected wallet");
	}

	let mut events = engine.event_bus().subscribe();
	tokio::spawn(async move {
		while let Ok(event) = events.recv().await {
			match serde_json::to_string(&event) {
				Ok(line) => println!("{}", line),
				Err(e) => tracing::warn!(error = %e, "Failed to encode event"),
			}
		}
	});

	engine.run().await?;
	Ok(())
}
