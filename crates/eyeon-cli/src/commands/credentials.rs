//! 자격증명 관리 명령.

use super::App;
use anyhow::Result;
use eyeon_core::CatalogStore;
use eyeon_exchange::NewCredentialInput;
use tracing::info;
use uuid::Uuid;

/// `add-credential` 인자.
pub struct AddCredentialArgs {
    pub exchange: String,
    pub user: Uuid,
    pub api_key: String,
    pub secret_key: String,
    pub label: Option<String>,
    pub testnet: bool,
}

pub async fn add_credential(app: &App, args: AddCredentialArgs) -> Result<()> {
    let handle = app.exchange(&args.exchange).await?;

    let mut input =
        NewCredentialInput::new(args.user, handle.exchange.id, args.api_key, args.secret_key);
    if let Some(label) = args.label {
        input = input.with_label(label);
    }
    input.is_testnet = args.testnet;

    let record = app.registry.credentials().store_credential(input).await?;

    info!(credential_id = %record.id, exchange = %handle.exchange.name, "Credential added");
    println!("자격증명 등록 완료: {} ({})", record.id, record.label);
    Ok(())
}

pub async fn list_credentials(app: &App, user: Uuid) -> Result<()> {
    let credentials = app.registry.credentials().list_for_user(user).await?;
    if credentials.is_empty() {
        println!("등록된 자격증명이 없습니다.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<36}  {:<12}  {:<7}  LAST USED",
        "ID", "EXCHANGE", "LABEL", "TESTNET"
    );
    for credential in credentials {
        let exchange = app
            .store
            .find_exchange(credential.exchange_id)
            .await?
            .map(|e| e.name)
            .unwrap_or_else(|| credential.exchange_id.to_string());
        let last_used = credential
            .last_used
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<36}  {:<36}  {:<12}  {:<7}  {}",
            credential.id, exchange, credential.label, credential.is_testnet, last_used
        );
    }
    Ok(())
}

pub async fn deactivate_credential(app: &App, id: Uuid) -> Result<()> {
    app.registry.credentials().deactivate(id).await?;
    println!("자격증명 비활성화 완료: {}", id);
    Ok(())
}
