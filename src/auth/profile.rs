// Post-sign-in health check: userinfo email and channel snippet
//
// Both lookups are best-effort; the manager logs failures and keeps the
// sign-in valid.

use anyhow::{Context, Result};
use reqwest::Client;
use url::Url;

use super::types::{ChannelList, UserProfile};

/// Fetch the signed-in account's email address
pub async fn fetch_email(
    client: &Client,
    userinfo_endpoint: &Url,
    access_token: &str,
) -> Result<Option<String>> {
    let response = client
        .get(userinfo_endpoint.clone())
        .bearer_auth(access_token)
        .send()
        .await
        .context("Failed to send userinfo request")?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("userinfo request failed: {status} - {body}");
    }

    let profile: UserProfile = response
        .json()
        .await
        .context("Failed to parse userinfo response")?;

    Ok(profile.email)
}

/// Fetch the signed-in account's channel and return its snippet title, if any
pub async fn fetch_channel_title(
    client: &Client,
    channels_endpoint: &Url,
    access_token: &str,
) -> Result<Option<String>> {
    let response = client
        .get(channels_endpoint.clone())
        .query(&[
            ("part", "snippet,contentDetails,statistics"),
            ("mine", "true"),
        ])
        .bearer_auth(access_token)
        .send()
        .await
        .context("Failed to send channel list request")?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("channel list request failed: {status} - {body}");
    }

    let channels: ChannelList = response
        .json()
        .await
        .context("Failed to parse channel list response")?;

    Ok(channels
        .items
        .into_iter()
        .next()
        .and_then(|channel| channel.snippet)
        .map(|snippet| snippet.title))
}
