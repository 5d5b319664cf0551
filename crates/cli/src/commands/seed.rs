use gavel_db::{ReferenceDataset, SeedResult, VerificationResult};

use crate::commands::{open_database, preflight, CommandResult, Preflight};

pub fn run() -> CommandResult {
    let Preflight { config, runtime } = match preflight("seed") {
        Ok(preflight) => preflight,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_database("seed", &config).await?;

        let outcome = async {
            let seeded = ReferenceDataset::load(&pool).await.map_err(|error| {
                CommandResult::failure("seed", "seed_execution", error.to_string(), 5)
            })?;
            let verification = ReferenceDataset::verify(&pool).await.map_err(|error| {
                CommandResult::failure("seed", "seed_verification", error.to_string(), 6)
            })?;
            Ok::<_, CommandResult>((seeded, verification))
        }
        .await;

        pool.close().await;
        outcome
    });

    match result {
        Ok((seeded, verification)) if verification.all_present => {
            CommandResult::success("seed", seed_summary(&seeded))
        }
        Ok((_, verification)) => CommandResult::failure(
            "seed",
            "seed_verification",
            verification_failure_message(&verification),
            6,
        ),
        Err(failure) => failure,
    }
}

fn seed_summary(seeded: &SeedResult) -> String {
    let mut lines = vec![format!(
        "reference dataset loaded: {} users, {} jewelry, {} auctions",
        seeded.users, seeded.jewelry, seeded.auctions
    )];
    for user in ReferenceDataset::users() {
        lines.push(format!("  - user {}: {} ({})", user.id, user.username, user.role));
    }
    for item in ReferenceDataset::jewelry() {
        lines.push(format!("  - jewelry {}: {} ({})", item.id, item.name, item.state.as_str()));
    }
    for auction in ReferenceDataset::auctions() {
        lines.push(format!(
            "  - auction {}: {} ({})",
            auction.id,
            auction.name,
            auction.state.as_str()
        ));
    }
    lines.join("\n")
}

fn verification_failure_message(verification: &VerificationResult) -> String {
    let failed_checks = verification
        .checks
        .iter()
        .filter_map(|(check, present)| (!present).then_some(check.as_str()))
        .collect::<Vec<_>>();
    if failed_checks.is_empty() {
        "some reference data failed to load".to_string()
    } else {
        format!("seed verification failed for: {}", failed_checks.join(", "))
    }
}
