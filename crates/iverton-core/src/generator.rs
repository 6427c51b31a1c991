//! Derived-data generators.
//!
//! Produce structurally valid widget payloads when no webhook data is
//! available. Generation never fails: missing parameters fall back to
//! [`DEFAULT_WEBSITE_URL`], [`DEFAULT_TIME_DURATION`] and
//! [`DEFAULT_KEYWORDS`]. A seeded generator yields the same payloads for the
//! same sequence of calls.

use std::sync::{Mutex, PoisonError};

use iverton_types::payload::{
    BacklinkData, CompetitorData, CompetitorSnapshot, DataCategory, FetchParams, HashtagData,
    HashtagStat, KeywordRanking, ReferringDomain, SeoRankingData, TrafficData, Trend,
    WidgetContent,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const DEFAULT_WEBSITE_URL: &str = "https://example.com";
pub const DEFAULT_TIME_DURATION: &str = "last 30 days";
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "digital marketing",
    "seo tools",
    "content strategy",
    "social media analytics",
    "brand monitoring",
];

const REFERRER_POOL: &[&str] = &[
    "medium.com",
    "forbes.com",
    "hubspot.com",
    "searchenginejournal.com",
    "moz.com",
    "techcrunch.com",
    "reddit.com",
    "producthunt.com",
];

const HASHTAG_POOL: &[&str] = &[
    "marketing",
    "seo",
    "branding",
    "growthhacking",
    "contentmarketing",
    "socialmedia",
    "analytics",
    "startup",
];

const COMPETITOR_POOL: &[&str] = &[
    "semrush.com",
    "ahrefs.com",
    "similarweb.com",
    "moz.com",
    "spyfu.com",
];

/// Resolved generator inputs.
struct Inputs {
    target_url: String,
    time_duration: String,
    keywords: Vec<String>,
}

impl Inputs {
    fn from_params(params: &FetchParams) -> Self {
        let non_blank = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(String::from);
        let keywords: Vec<String> = params
            .keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(String::from)
            .collect();

        Self {
            target_url: non_blank(&params.website_url)
                .unwrap_or_else(|| DEFAULT_WEBSITE_URL.to_string()),
            time_duration: non_blank(&params.time_duration)
                .unwrap_or_else(|| DEFAULT_TIME_DURATION.to_string()),
            keywords: if keywords.is_empty() {
                DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect()
            } else {
                keywords
            },
        }
    }
}

/// Number of days covered by a duration label like "last 7 days".
fn days_in(time_duration: &str) -> usize {
    time_duration
        .split_whitespace()
        .find_map(|word| word.parse::<usize>().ok())
        .filter(|days| (1..=365).contains(days))
        .unwrap_or(30)
}

pub struct DataGenerator {
    rng: Mutex<StdRng>,
}

impl DataGenerator {
    /// Deterministic generator.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Generator seeded from the operating system.
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    pub fn generate(&self, category: DataCategory, params: &FetchParams) -> WidgetContent {
        let inputs = Inputs::from_params(params);
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let rng = &mut *rng;

        match category {
            DataCategory::SeoRanking => WidgetContent::SeoRanking(seo_ranking(rng, inputs)),
            DataCategory::Backlinks => WidgetContent::Backlinks(backlinks(rng, inputs)),
            DataCategory::Hashtags => WidgetContent::Hashtags(hashtags(rng, inputs)),
            DataCategory::CompetitorIntel => {
                WidgetContent::CompetitorIntel(competitors(rng, inputs))
            }
            DataCategory::TrafficOverview => WidgetContent::TrafficOverview(traffic(rng, inputs)),
        }
    }
}

impl std::fmt::Debug for DataGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataGenerator").finish_non_exhaustive()
    }
}

fn seo_ranking(rng: &mut StdRng, inputs: Inputs) -> SeoRankingData {
    let keywords: Vec<KeywordRanking> = inputs
        .keywords
        .into_iter()
        .map(|keyword| {
            let position = rng.random_range(1..=50);
            let delta: i64 = rng.random_range(-5..=5);
            let previous_position = (i64::from(position) + delta).clamp(1, 100) as u32;
            KeywordRanking {
                keyword,
                position,
                previous_position,
                search_volume: rng.random_range(100..=50_000),
                difficulty: rng.random_range(5..=95),
            }
        })
        .collect();

    // Visibility falls off with position: top-3 counts fully, page one half.
    let visibility: f64 = keywords
        .iter()
        .map(|k| match k.position {
            1..=3 => 1.0,
            4..=10 => 0.5,
            11..=20 => 0.15,
            _ => 0.0,
        })
        .sum::<f64>()
        / keywords.len().max(1) as f64;

    SeoRankingData {
        target_url: inputs.target_url,
        time_duration: inputs.time_duration,
        visibility_score: (visibility * 1000.0).round() / 10.0,
        keywords,
    }
}

fn backlinks(rng: &mut StdRng, inputs: Inputs) -> BacklinkData {
    let mut top_referrers: Vec<ReferringDomain> = REFERRER_POOL
        .iter()
        .take(5)
        .map(|domain| ReferringDomain {
            domain: domain.to_string(),
            authority: rng.random_range(40..=95),
            links: rng.random_range(1..=250),
        })
        .collect();
    top_referrers.sort_by(|a, b| b.links.cmp(&a.links));

    let referring_domains = rng.random_range(50..=1_500);
    BacklinkData {
        target_url: inputs.target_url,
        total_backlinks: referring_domains * rng.random_range(3..=12),
        referring_domains,
        domain_authority: rng.random_range(10..=90),
        new_links: rng.random_range(0..=120),
        lost_links: rng.random_range(0..=60),
        top_referrers,
    }
}

fn hashtags(rng: &mut StdRng, inputs: Inputs) -> HashtagData {
    let from_keywords = inputs
        .keywords
        .iter()
        .map(|k| k.replace(' ', "").to_lowercase());
    let tags: Vec<String> = from_keywords
        .chain(HASHTAG_POOL.iter().map(|t| t.to_string()))
        .take(8)
        .collect();

    let hashtags = tags
        .into_iter()
        .map(|tag| {
            let trend = match rng.random_range(0..3) {
                0 => Trend::Rising,
                1 => Trend::Steady,
                _ => Trend::Falling,
            };
            HashtagStat {
                tag: format!("#{tag}"),
                posts: rng.random_range(1_000..=2_000_000),
                engagement_rate: (rng.random_range(0.5..8.0_f64) * 100.0).round() / 100.0,
                trend,
            }
        })
        .collect();

    HashtagData {
        target_url: inputs.target_url,
        hashtags,
    }
}

fn competitors(rng: &mut StdRng, inputs: Inputs) -> CompetitorData {
    let competitors = COMPETITOR_POOL
        .iter()
        .filter(|domain| !inputs.target_url.contains(*domain))
        .map(|domain| CompetitorSnapshot {
            domain: domain.to_string(),
            shared_keywords: rng.random_range(10..=800),
            estimated_traffic: rng.random_range(5_000..=2_000_000),
            authority: rng.random_range(30..=95),
        })
        .collect();

    CompetitorData {
        target_url: inputs.target_url,
        competitors,
    }
}

fn traffic(rng: &mut StdRng, inputs: Inputs) -> TrafficData {
    let days = days_in(&inputs.time_duration);
    let base: u32 = rng.random_range(200..=5_000);
    let daily_sessions: Vec<u32> = (0..days)
        .map(|_| {
            let jitter: f64 = rng.random_range(0.7..1.3);
            (f64::from(base) * jitter).round() as u32
        })
        .collect();

    TrafficData {
        target_url: inputs.target_url,
        time_duration: inputs.time_duration,
        sessions: daily_sessions.iter().sum(),
        bounce_rate: (rng.random_range(0.25..0.75_f64) * 1000.0).round() / 1000.0,
        avg_session_secs: rng.random_range(30..=420),
        daily_sessions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_payload() {
        let params = FetchParams::for_site("https://acme.io", "last 7 days");
        for category in DataCategory::ALL {
            let a = DataGenerator::seeded(42).generate(category, &params);
            let b = DataGenerator::seeded(42).generate(category, &params);
            assert_eq!(a, b, "category {category}");
        }
    }

    #[test]
    fn payload_matches_category_and_target() {
        let generator = DataGenerator::seeded(7);
        let params = FetchParams::for_site("https://acme.io", "last 7 days");
        for category in DataCategory::ALL {
            let content = generator.generate(category, &params);
            assert_eq!(content.category(), Some(category));
            assert_eq!(content.target_url(), Some("https://acme.io"));
        }
    }

    #[test]
    fn missing_params_fall_back_to_defaults() {
        let generator = DataGenerator::seeded(1);
        let params = FetchParams {
            website_url: Some("   ".to_string()),
            time_duration: None,
            keywords: vec![String::new()],
        };

        match generator.generate(DataCategory::SeoRanking, &params) {
            WidgetContent::SeoRanking(data) => {
                assert_eq!(data.target_url, DEFAULT_WEBSITE_URL);
                assert_eq!(data.time_duration, DEFAULT_TIME_DURATION);
                assert_eq!(data.keywords.len(), DEFAULT_KEYWORDS.len());
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn traffic_series_covers_requested_days() {
        let generator = DataGenerator::seeded(3);
        let params = FetchParams::for_site("https://acme.io", "last 7 days");
        match generator.generate(DataCategory::TrafficOverview, &params) {
            WidgetContent::TrafficOverview(data) => {
                assert_eq!(data.daily_sessions.len(), 7);
                assert_eq!(data.sessions, data.daily_sessions.iter().sum::<u32>());
                assert!((0.0..=1.0).contains(&data.bounce_rate));
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn ranking_positions_stay_in_range() {
        let generator = DataGenerator::seeded(99);
        match generator.generate(DataCategory::SeoRanking, &FetchParams::default()) {
            WidgetContent::SeoRanking(data) => {
                for k in &data.keywords {
                    assert!((1..=50).contains(&k.position));
                    assert!((1..=100).contains(&k.previous_position));
                    assert!(k.difficulty <= 95);
                }
                assert!((0.0..=100.0).contains(&data.visibility_score));
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn days_parsing() {
        assert_eq!(days_in("last 7 days"), 7);
        assert_eq!(days_in("last 90 days"), 90);
        assert_eq!(days_in("this quarter"), 30);
        assert_eq!(days_in("last 0 days"), 30);
    }
}
