use async_nats::Client;
use url::Url;

use crate::Result;

pub async fn connect(nats_url: &str) -> Result<Client> {
    let shown = redact(nats_url);
    tracing::debug!("connecting to NATS at {}", shown);
    let nc = async_nats::connect(nats_url).await?;
    tracing::info!("connected to NATS at {}", shown);
    Ok(nc)
}

pub async fn subscribe(nc: &Client, subject: &str) -> Result<async_nats::Subscriber> {
    let sub = nc.subscribe(subject.to_string()).await?;
    tracing::info!("subscribed to subject: [{}]", subject);
    Ok(sub)
}

/// Server url safe to log: user, password or token replaced by `***`.
pub fn redact(nats_url: &str) -> String {
    let Ok(mut url) = Url::parse(nats_url) else {
        return nats_url.to_string();
    };
    if url.password().is_some() {
        let _ = url.set_password(Some("***"));
    } else if !url.username().is_empty() {
        // a lone user part is a token
        let _ = url.set_username("***");
    }
    url.to_string()
}
