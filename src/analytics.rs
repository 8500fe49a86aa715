use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{Duration, NaiveDate};
use regex::Regex;
use serde::Serialize;

/// 流量来源，按 referrer 正则归类
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TrafficSource {
    Direct,
    Google,
    Facebook,
    Twitter,
    Other,
}

impl TrafficSource {
    pub fn as_str(self) -> &'static str {
        match self {
            TrafficSource::Direct => "direct",
            TrafficSource::Google => "google",
            TrafficSource::Facebook => "facebook",
            TrafficSource::Twitter => "twitter",
            TrafficSource::Other => "other",
        }
    }
}

/// 设备类型，按 user-agent 正则归类
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Device {
    Mobile,
    Tablet,
    Desktop,
}

impl Device {
    pub fn as_str(self) -> &'static str {
        match self {
            Device::Mobile => "mobile",
            Device::Tablet => "tablet",
            Device::Desktop => "desktop",
        }
    }
}

/// 浏览器，按 user-agent 正则归类
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Browser {
    Chrome,
    Firefox,
    Safari,
    Edge,
    InternetExplorer,
    Other,
}

impl Browser {
    pub fn as_str(self) -> &'static str {
        match self {
            Browser::Chrome => "Chrome",
            Browser::Firefox => "Firefox",
            Browser::Safari => "Safari",
            Browser::Edge => "Edge",
            Browser::InternetExplorer => "Internet Explorer",
            Browser::Other => "Other",
        }
    }
}

static GOOGLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"google\.com").unwrap());
static FACEBOOK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"facebook\.com").unwrap());
static TWITTER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"twitter\.com").unwrap());

static MOBILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Mobile|Android|iPhone|iPad|iPod").unwrap());
static TABLET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)Tablet|iPad").unwrap());

static CHROME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)Chrome").unwrap());
static FIREFOX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)Firefox").unwrap());
static SAFARI: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)Safari").unwrap());
static EDGE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)Edge|Edg").unwrap());
static MSIE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)MSIE|Trident").unwrap());

/// 归类 referrer
pub fn classify_referrer(referrer: &str) -> TrafficSource {
    if referrer.is_empty() {
        TrafficSource::Direct
    } else if GOOGLE.is_match(referrer) {
        TrafficSource::Google
    } else if FACEBOOK.is_match(referrer) {
        TrafficSource::Facebook
    } else if TWITTER.is_match(referrer) {
        TrafficSource::Twitter
    } else {
        TrafficSource::Other
    }
}

/// 归类设备
///
/// 移动端优先于平板判断，iPad 因此会落入 mobile。
pub fn classify_device(user_agent: &str) -> Device {
    if MOBILE.is_match(user_agent) {
        Device::Mobile
    } else if TABLET.is_match(user_agent) {
        Device::Tablet
    } else {
        Device::Desktop
    }
}

/// 归类浏览器
///
/// Chrome 的 UA 包含 Safari 字样，匹配顺序不可调换。
pub fn classify_browser(user_agent: &str) -> Browser {
    if CHROME.is_match(user_agent) {
        Browser::Chrome
    } else if FIREFOX.is_match(user_agent) {
        Browser::Firefox
    } else if SAFARI.is_match(user_agent) {
        Browser::Safari
    } else if EDGE.is_match(user_agent) {
        Browser::Edge
    } else if MSIE.is_match(user_agent) {
        Browser::InternetExplorer
    } else {
        Browser::Other
    }
}

/// 单日访问量
#[derive(Debug, Clone, Serialize)]
pub struct DailyVisits {
    /// `YYYY-MM-DD`
    pub date: String,
    pub visits: i64,
}

/// 按来源归并后的计数
#[derive(Debug, Clone, Serialize)]
pub struct SourceCount {
    pub source: &'static str,
    pub count: i64,
}

/// 按设备归并后的计数
#[derive(Debug, Clone, Serialize)]
pub struct DeviceCount {
    pub device: &'static str,
    pub count: i64,
}

/// 按浏览器归并后的计数
#[derive(Debug, Clone, Serialize)]
pub struct BrowserCount {
    pub browser: &'static str,
    pub count: i64,
}

/// 把 referrer 分组计数归并为来源桶，direct 恒在首位
pub fn source_buckets(referrers: Vec<(String, i64)>, direct: i64) -> Vec<SourceCount> {
    let mut buckets: BTreeMap<TrafficSource, i64> = BTreeMap::new();
    for (referrer, count) in referrers {
        *buckets.entry(classify_referrer(&referrer)).or_default() += count;
    }

    let mut result = vec![SourceCount {
        source: TrafficSource::Direct.as_str(),
        count: direct,
    }];
    result.extend(buckets.into_iter().map(|(source, count)| SourceCount {
        source: source.as_str(),
        count,
    }));
    result
}

/// 把 user-agent 分组计数归并为设备桶
pub fn device_buckets(user_agents: &[(String, i64)]) -> Vec<DeviceCount> {
    let mut buckets: BTreeMap<Device, i64> = BTreeMap::new();
    for (ua, count) in user_agents {
        *buckets.entry(classify_device(ua)).or_default() += count;
    }
    buckets
        .into_iter()
        .map(|(device, count)| DeviceCount {
            device: device.as_str(),
            count,
        })
        .collect()
}

/// 把 user-agent 分组计数归并为浏览器桶
pub fn browser_buckets(user_agents: &[(String, i64)]) -> Vec<BrowserCount> {
    let mut buckets: BTreeMap<Browser, i64> = BTreeMap::new();
    for (ua, count) in user_agents {
        *buckets.entry(classify_browser(ua)).or_default() += count;
    }
    buckets
        .into_iter()
        .map(|(browser, count)| BrowserCount {
            browser: browser.as_str(),
            count,
        })
        .collect()
}

/// 把按天分组的原始计数补零展开为连续 `days` 天
///
/// 时间升序，最后一天为 `today`。
pub fn zero_filled_days(days: i64, today: NaiveDate, raw: &[(String, i64)]) -> Vec<DailyVisits> {
    let counts: BTreeMap<&str, i64> = raw.iter().map(|(d, c)| (d.as_str(), *c)).collect();

    (0..days)
        .map(|i| {
            let date = (today - Duration::days(days - i - 1))
                .format("%Y-%m-%d")
                .to_string();
            let visits = counts.get(date.as_str()).copied().unwrap_or(0);
            DailyVisits { date, visits }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_referrer() {
        assert_eq!(classify_referrer(""), TrafficSource::Direct);
        assert_eq!(
            classify_referrer("https://www.google.com/search?q=rust"),
            TrafficSource::Google
        );
        assert_eq!(
            classify_referrer("https://m.facebook.com/"),
            TrafficSource::Facebook
        );
        assert_eq!(
            classify_referrer("https://twitter.com/home"),
            TrafficSource::Twitter
        );
        assert_eq!(
            classify_referrer("https://news.ycombinator.com/"),
            TrafficSource::Other
        );
    }

    #[test]
    fn test_classify_device() {
        assert_eq!(
            classify_device("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)"),
            Device::Mobile
        );
        // iPad 先命中移动端正则
        assert_eq!(
            classify_device("Mozilla/5.0 (iPad; CPU OS 16_0 like Mac OS X)"),
            Device::Mobile
        );
        assert_eq!(
            classify_device("Mozilla/5.0 (Windows NT 10.0; Win64; x64)"),
            Device::Desktop
        );
    }

    #[test]
    fn test_classify_browser() {
        assert_eq!(
            classify_browser("Mozilla/5.0 ... Chrome/120.0 Safari/537.36"),
            Browser::Chrome
        );
        assert_eq!(
            classify_browser("Mozilla/5.0 ... Gecko/20100101 Firefox/121.0"),
            Browser::Firefox
        );
        assert_eq!(
            classify_browser("Mozilla/5.0 ... Version/17.0 Safari/605.1.15"),
            Browser::Safari
        );
        assert_eq!(
            classify_browser("Mozilla/5.0 (compatible; MSIE 10.0)"),
            Browser::InternetExplorer
        );
        assert_eq!(classify_browser("curl/8.0"), Browser::Other);
    }

    #[test]
    fn test_source_buckets() {
        let rows = vec![
            ("https://www.google.com/".to_string(), 3),
            ("https://google.com/search".to_string(), 2),
            ("https://example.com/".to_string(), 1),
        ];
        let buckets = source_buckets(rows, 7);

        assert_eq!(buckets[0].source, "direct");
        assert_eq!(buckets[0].count, 7);
        assert!(buckets.iter().any(|b| b.source == "google" && b.count == 5));
        assert!(buckets.iter().any(|b| b.source == "other" && b.count == 1));
    }

    #[test]
    fn test_zero_filled_days() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let raw = vec![("2025-03-09".to_string(), 4)];

        let filled = zero_filled_days(3, today, &raw);

        assert_eq!(filled.len(), 3);
        assert_eq!(filled[0].date, "2025-03-08");
        assert_eq!(filled[0].visits, 0);
        assert_eq!(filled[1].date, "2025-03-09");
        assert_eq!(filled[1].visits, 4);
        assert_eq!(filled[2].date, "2025-03-10");
        assert_eq!(filled[2].visits, 0);
    }
}
