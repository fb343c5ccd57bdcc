use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Sentinel standing in for every unset field value.
pub const NOT_AVAILABLE: &str = "-";

/// Closed schema of profile fields shared by all sources.
///
/// Every record carries every key; a field that a source does not populate
/// holds the sentinel. "Missing key" is therefore a type error, not a
/// runtime lookup failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    Name,
    Ticker,
    Website,
    ProfileUrl,
    LogoUrl,
    Description,
    Platform,
    TokenStandard,
    PreSaleStart,
    PreSaleEnd,
    SaleStart,
    SaleEnd,
    Status,
    RaiseGoal,
    Raised,
    SoftCap,
    HardCap,
    PreSalePrice,
    SalePrice,
    Country,
    CountriesRestricted,
    AcceptedCurrencies,
    Kyc,
    Whitelist,
    OverallScore,
    TeamScore,
    HypeScore,
    RiskScore,
    TelegramUrl,
    TwitterUrl,
    GithubUrl,
    RedditUrl,
    MediumUrl,
    FacebookUrl,
    LinkedinUrl,
    BitcointalkUrl,
}

impl FieldKey {
    /// All schema keys, in canonical (output) order.
    pub const ALL: &'static [FieldKey] = &[
        FieldKey::Name,
        FieldKey::Ticker,
        FieldKey::Website,
        FieldKey::ProfileUrl,
        FieldKey::LogoUrl,
        FieldKey::Description,
        FieldKey::Platform,
        FieldKey::TokenStandard,
        FieldKey::PreSaleStart,
        FieldKey::PreSaleEnd,
        FieldKey::SaleStart,
        FieldKey::SaleEnd,
        FieldKey::Status,
        FieldKey::RaiseGoal,
        FieldKey::Raised,
        FieldKey::SoftCap,
        FieldKey::HardCap,
        FieldKey::PreSalePrice,
        FieldKey::SalePrice,
        FieldKey::Country,
        FieldKey::CountriesRestricted,
        FieldKey::AcceptedCurrencies,
        FieldKey::Kyc,
        FieldKey::Whitelist,
        FieldKey::OverallScore,
        FieldKey::TeamScore,
        FieldKey::HypeScore,
        FieldKey::RiskScore,
        FieldKey::TelegramUrl,
        FieldKey::TwitterUrl,
        FieldKey::GithubUrl,
        FieldKey::RedditUrl,
        FieldKey::MediumUrl,
        FieldKey::FacebookUrl,
        FieldKey::LinkedinUrl,
        FieldKey::BitcointalkUrl,
    ];

    /// Date-valued fields, normalized to `%d-%m-%Y` by the pipeline.
    pub const DATE_KEYS: &'static [FieldKey] = &[
        FieldKey::PreSaleStart,
        FieldKey::PreSaleEnd,
        FieldKey::SaleStart,
        FieldKey::SaleEnd,
    ];

    /// Country-valued fields, normalized to ISO alpha-3 lists.
    pub const COUNTRY_KEYS: &'static [FieldKey] =
        &[FieldKey::Country, FieldKey::CountriesRestricted];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKey::Name => "name",
            FieldKey::Ticker => "ticker",
            FieldKey::Website => "website",
            FieldKey::ProfileUrl => "profile_url",
            FieldKey::LogoUrl => "logo_url",
            FieldKey::Description => "description",
            FieldKey::Platform => "platform",
            FieldKey::TokenStandard => "token_standard",
            FieldKey::PreSaleStart => "pre_sale_start",
            FieldKey::PreSaleEnd => "pre_sale_end",
            FieldKey::SaleStart => "sale_start",
            FieldKey::SaleEnd => "sale_end",
            FieldKey::Status => "status",
            FieldKey::RaiseGoal => "raise_goal",
            FieldKey::Raised => "raised",
            FieldKey::SoftCap => "soft_cap",
            FieldKey::HardCap => "hard_cap",
            FieldKey::PreSalePrice => "pre_sale_price",
            FieldKey::SalePrice => "sale_price",
            FieldKey::Country => "country",
            FieldKey::CountriesRestricted => "countries_restricted",
            FieldKey::AcceptedCurrencies => "accepted_currencies",
            FieldKey::Kyc => "kyc",
            FieldKey::Whitelist => "whitelist",
            FieldKey::OverallScore => "overall_score",
            FieldKey::TeamScore => "team_score",
            FieldKey::HypeScore => "hype_score",
            FieldKey::RiskScore => "risk_score",
            FieldKey::TelegramUrl => "telegram_url",
            FieldKey::TwitterUrl => "twitter_url",
            FieldKey::GithubUrl => "github_url",
            FieldKey::RedditUrl => "reddit_url",
            FieldKey::MediumUrl => "medium_url",
            FieldKey::FacebookUrl => "facebook_url",
            FieldKey::LinkedinUrl => "linkedin_url",
            FieldKey::BitcointalkUrl => "bitcointalk_url",
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FieldKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldKey::ALL
            .iter()
            .find(|k| k.as_str() == s)
            .copied()
            .ok_or_else(|| format!("Unknown field key: {s}"))
    }
}

/// Lifecycle phase of a fundraising campaign, parsed from the status field.
///
/// Drives the missing-year inference in the date normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignStatus {
    Upcoming,
    Active,
    Ended,
}

impl CampaignStatus {
    /// Lenient parse over the status spellings seen across sources.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "upcoming" | "pre-sale" | "presale" => Some(CampaignStatus::Upcoming),
            "active" | "ongoing" | "running" | "live" => Some(CampaignStatus::Active),
            "ended" | "finished" | "past" | "closed" => Some(CampaignStatus::Ended),
            _ => None,
        }
    }
}

/// One subject's profile data from a single source.
///
/// Fields are initialized to the sentinel and mutated in place by the
/// normalization pipeline and the reconciliation merge; the key set never
/// shrinks or grows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Identifier of the originating source (site id).
    pub source: String,
    fields: BTreeMap<FieldKey, String>,
}

impl Record {
    /// Create a record with every field set to the sentinel.
    pub fn new(source: impl Into<String>) -> Self {
        let fields = FieldKey::ALL
            .iter()
            .map(|k| (*k, NOT_AVAILABLE.to_string()))
            .collect();
        Self {
            source: source.into(),
            fields,
        }
    }

    pub fn get(&self, key: FieldKey) -> &str {
        self.fields
            .get(&key)
            .map(String::as_str)
            .unwrap_or(NOT_AVAILABLE)
    }

    pub fn set(&mut self, key: FieldKey, value: impl Into<String>) {
        self.fields.insert(key, value.into());
    }

    /// Count of fields holding a real value (not `sentinel`).
    pub fn populated_count(&self, sentinel: &str) -> usize {
        self.fields.values().filter(|v| v.as_str() != sentinel).count()
    }

    /// Campaign status, if the status field holds a recognized spelling.
    pub fn status(&self) -> Option<CampaignStatus> {
        CampaignStatus::parse(self.get(FieldKey::Status))
    }
}
