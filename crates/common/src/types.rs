use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

/// A text column held a value that maps to no known variant.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Delivery channel of a notification or message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    InApp,
    Email,
    Sms,
    Chat,
    Push,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::InApp => "in_app",
            ChannelType::Email => "email",
            ChannelType::Sms => "sms",
            ChannelType::Chat => "chat",
            ChannelType::Push => "push",
        }
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_app" => Ok(ChannelType::InApp),
            "email" => Ok(ChannelType::Email),
            "sms" => Ok(ChannelType::Sms),
            "chat" => Ok(ChannelType::Chat),
            "push" => Ok(ChannelType::Push),
            other => Err(ParseEnumError::new("channel", other)),
        }
    }
}

/// Kind of workflow step a job executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Trigger,
    InApp,
    Email,
    Sms,
    Chat,
    Push,
    Digest,
    Delay,
}

impl std::fmt::Display for StepType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepType::Trigger => write!(f, "trigger"),
            StepType::InApp => write!(f, "in_app"),
            StepType::Email => write!(f, "email"),
            StepType::Sms => write!(f, "sms"),
            StepType::Chat => write!(f, "chat"),
            StepType::Push => write!(f, "push"),
            StepType::Digest => write!(f, "digest"),
            StepType::Delay => write!(f, "delay"),
        }
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Queued,
    Running,
    Completed,
    Failed,
    Canceled,
}

/// Outcome recorded by an execution detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ExecutionDetailStatus {
    Pending,
    Queued,
    Success,
    Warning,
    Failed,
}

/// Who produced an execution detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ExecutionDetailSource {
    Internal,
    Webhook,
    Credentials,
    Payload,
}

/// State of a message's call-to-action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageActionStatus {
    #[default]
    Pending,
    Done,
}

impl std::fmt::Display for MessageActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageActionStatus::Pending => write!(f, "pending"),
            MessageActionStatus::Done => write!(f, "done"),
        }
    }
}

/// Which call-to-action button was pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonType {
    Primary,
    Secondary,
}

impl std::fmt::Display for ButtonType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ButtonType::Primary => write!(f, "primary"),
            ButtonType::Secondary => write!(f, "secondary"),
        }
    }
}

impl FromStr for ButtonType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(ButtonType::Primary),
            "secondary" => Ok(ButtonType::Secondary),
            other => Err(ParseEnumError::new("button type", other)),
        }
    }
}

/// A notification record: one trigger fired for one subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub environment_id: Uuid,
    pub organization_id: Uuid,
    pub subscriber_id: Uuid,
    pub template_id: Uuid,
    pub transaction_id: String,
    pub channels: Vec<ChannelType>,
    pub created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for Notification {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let channels: Vec<String> = row.try_get("channels")?;
        Ok(Self {
            id: row.try_get("id")?,
            environment_id: row.try_get("environment_id")?,
            organization_id: row.try_get("organization_id")?,
            subscriber_id: row.try_get("subscriber_id")?,
            template_id: row.try_get("template_id")?,
            transaction_id: row.try_get("transaction_id")?,
            channels: parse_channels("channels", &channels)?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Decode a `text[]` column of channel names.
pub fn parse_channels(column: &str, raw: &[String]) -> Result<Vec<ChannelType>, sqlx::Error> {
    raw.iter()
        .map(|c| c.parse::<ChannelType>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: Box::new(e),
        })
}

/// The subscriber fields exposed alongside a feed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SubscriberSummary {
    pub id: Uuid,
    pub subscriber_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// The template fields exposed alongside a feed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TemplateSummary {
    pub id: Uuid,
    pub name: String,
    pub triggers: serde_json::Value,
}

/// Step metadata attached to a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StepSummary {
    pub id: Uuid,
    pub step_type: StepType,
    pub name: Option<String>,
    pub active: bool,
    pub metadata: serde_json::Value,
}

/// A job spawned for one step of a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Job {
    pub id: Uuid,
    pub notification_id: Uuid,
    pub step_id: Option<Uuid>,
    pub step_type: StepType,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
}

/// A log line recorded while a job ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ExecutionDetail {
    pub id: Uuid,
    pub job_id: Uuid,
    pub notification_id: Uuid,
    pub detail: String,
    pub source: ExecutionDetailSource,
    pub status: ExecutionDetailStatus,
    pub is_test: bool,
    pub is_retry: bool,
    pub raw: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A job with its step and execution details populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulatedJob {
    #[serde(flatten)]
    pub job: Job,
    pub step: Option<StepSummary>,
    pub execution_details: Vec<ExecutionDetail>,
}

/// A notification with its subscriber, template and jobs populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    #[serde(flatten)]
    pub notification: Notification,
    pub subscriber: Option<SubscriberSummary>,
    pub template: Option<TemplateSummary>,
    pub jobs: Vec<PopulatedJob>,
}

/// One page of the activity feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedPage {
    pub total_count: i64,
    pub data: Vec<FeedItem>,
}

/// Activity for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityGraphEntry {
    /// Day formatted as `YYYY-MM-DD`.
    pub id: String,
    pub count: i64,
    pub templates: Vec<Uuid>,
    pub channels: Vec<ChannelType>,
}

/// Notification counts over rolling windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationStats {
    pub weekly: i64,
    pub monthly: i64,
    pub yearly: i64,
}

/// Result of a call-to-action press.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    #[serde(rename = "type")]
    pub button_type: ButtonType,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// A button rendered for a call-to-action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionButton {
    #[serde(rename = "type")]
    pub button_type: ButtonType,
    pub content: String,
}

/// Action part of a call-to-action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageAction {
    #[serde(default)]
    pub status: MessageActionStatus,
    #[serde(default)]
    pub buttons: Vec<ActionButton>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ActionResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CtaData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Call-to-action attached to an in-app message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cta {
    #[serde(rename = "type", default = "Cta::default_type")]
    pub cta_type: String,
    #[serde(default)]
    pub data: CtaData,
    #[serde(default)]
    pub action: MessageAction,
}

impl Cta {
    fn default_type() -> String {
        "redirect".to_string()
    }
}

impl Default for Cta {
    fn default() -> Self {
        Self {
            cta_type: Self::default_type(),
            data: CtaData::default(),
            action: MessageAction::default(),
        }
    }
}

/// Optional narrowing of a subscriber's message feed. `None` fields are not filtered on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seen: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<bool>,
}

/// An in-app message as shown in a subscriber's feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    #[serde(default)]
    pub seen: bool,
    /// `None` when the sender never reported a read state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<bool>,
    #[serde(default)]
    pub content: String,
    pub channel: ChannelType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_identifier: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta: Option<Cta>,
    pub created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for Message {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let cta: Option<sqlx::types::Json<Cta>> = row.try_get("cta")?;
        Ok(Self {
            id: row.try_get("id")?,
            seen: row.try_get("seen")?,
            read: row.try_get("read")?,
            content: row.try_get("content")?,
            channel: row.try_get("channel")?,
            feed_identifier: row.try_get("feed_identifier")?,
            payload: row.try_get("payload")?,
            cta: cta.map(|c| c.0),
            created_at: row.try_get("created_at")?,
        })
    }
}

/// One page of a subscriber's message feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageFeedPage {
    pub data: Vec<Message>,
    pub page: i64,
    pub page_size: i64,
}
