//! User-agent classification
//!
//! Guesses browser, browser version and operating system from a
//! `User-Agent` header. Only a known browser on a known OS yields a
//! description; anything else is unclassified.

use crate::fingerprint::ClientDescription;

/// Anything that can describe the client behind a user-agent string
pub trait AgentClassifier: Send + Sync {
    fn classify(&self, user_agent: &str) -> Option<ClientDescription>;
}

/// OS signatures, most specific first
const OS_SIGNATURES: &[(&str, &str)] = &[
    ("Intel Mac OS X 10.15", "Mac OS X (Catalina)"),
    ("Intel Mac OS X 10_15", "Mac OS X (Catalina)"),
    ("Intel Mac OS X 10.14", "Mac OS X (Mojave)"),
    ("Intel Mac OS X 10_14_", "Mac OS X (Mojave)"),
    ("Intel Mac OS X 10.13", "Mac OS X (High Sierra)"),
    ("Intel Mac OS X 10_13_", "Mac OS X (High Sierra)"),
    ("Intel Mac OS X 10.12", "Mac OS X (Sierra)"),
    ("Intel Mac OS X 10_12_", "Mac OS X (Sierra)"),
    ("Intel Mac OS X 10.11", "Mac OS X (El Capitan)"),
    ("Intel Mac OS X 10_11_", "Mac OS X (El Capitan)"),
    ("Intel Mac OS X 10.10", "Mac OS X (Yosemite)"),
    ("Intel Mac OS X 10_10_", "Mac OS X (Yosemite)"),
    ("Intel Mac OS X 10.9", "Mac OS X (Mavericks)"),
    ("Intel Mac OS X 10_9_", "Mac OS X (Mavericks)"),
    ("Intel Mac OS X 10.8", "Mac OS X (Mountain Lion)"),
    ("Intel Mac OS X 10_8_", "Mac OS X (Mountain Lion)"),
    ("Intel Mac OS X 10.7", "Mac OS X (Lion)"),
    ("Intel Mac OS X 10_7_", "Mac OS X (Lion)"),
    ("Intel Mac OS X 10.6", "Mac OS X (Snow Leopard)"),
    ("Intel Mac OS X 10_6_", "Mac OS X (Snow Leopard)"),
    ("Macintosh; U; Intel Mac OS X", "Mac OS X"),
    ("Windows NT 10.0", "Windows 10"),
    ("Windows NT 6.3", "Windows 8.1"),
    ("Windows NT 6.2", "Windows 8"),
    ("Windows NT 6.1", "Windows 7"),
    ("Windows NT 5.2", "Windows Server 2003"),
    ("Mobile; Windows Phone 8.1", "Windows Phone 8.1"),
    ("CPU iPhone OS 12_1", "iOS 12.1"),
    ("CPU iPhone OS 11_4", "iOS 11.4"),
    ("CPU iPhone OS 11_3", "iOS 11.3"),
    ("CPU iPhone OS 11_2", "iOS 11.2"),
    ("CPU iPhone OS 11_1", "iOS 11.1"),
    ("CPU iPhone OS 11_0", "iOS 11"),
    ("CPU iPhone OS 10_3", "iOS 10.3"),
    ("CPU iPhone OS 9_3", "iOS 9.3"),
    ("CPU iPhone OS 9_2", "iOS 9.2"),
    ("CPU iPhone OS 9_1", "iOS 9.1"),
    ("CPU iPhone OS 9_0_1", "iOS 9"),
    ("iPad; CPU OS 12_1", "iOS 12.1"),
    ("iPad; CPU OS 11_4", "iOS 11.4"),
    ("iPad; CPU OS 11_3", "iOS 11.3"),
    ("iPad; CPU OS 11_2", "iOS 11.2"),
    ("iPad; CPU OS 11_0", "iOS 11"),
    ("iPad; CPU OS 8_1", "iOS 8.1"),
    ("Linux; Android 9", "Android 9"),
    ("Linux; Android 8.", "Android 8"),
    ("Linux; Android 7.", "Android 7"),
    ("Linux; Android 6.", "Android 6"),
    ("Linux; Android 5.", "Android 5"),
    ("Linux; Android 4.", "Android 4"),
    ("X11; Ubuntu; Linux", "Linux"),
    ("X11; Linux", "Linux"),
    ("Linux i686", "Linux"),
    ("Grapeshot", "Grapeshot"),
    ("Browsershots", "Browsershots"),
];

/// Version token (`digits` and dots) at the start of `s`
fn version_prefix(s: &str) -> &str {
    let end = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    s[..end].trim_end_matches('.')
}

/// Version following `token` anywhere in the string
fn version_after<'a>(ua: &'a str, token: &str) -> Option<&'a str> {
    let start = ua.find(token)? + token.len();
    let version = version_prefix(&ua[start..]);
    has_major_minor(version).then_some(version)
}

/// Version of the final product token, when that token is `product/`
fn trailing_version<'a>(ua: &'a str, product: &str) -> Option<&'a str> {
    let last = ua.rsplit(' ').next()?;
    let version = last.strip_prefix(product)?;
    (version_prefix(version) == version && has_major_minor(version)).then_some(version)
}

fn has_major_minor(version: &str) -> bool {
    let mut parts = version.split('.');
    matches!((parts.next(), parts.next()), (Some(a), Some(b)) if !a.is_empty() && !b.is_empty())
}

/// First `n` dot separated components
fn components(version: &str, n: usize) -> String {
    version.split('.').take(n).collect::<Vec<_>>().join(".")
}

fn chrome(ua: &str) -> Option<String> {
    trailing_version(ua, "Safari/")?;
    let mut tokens = ua.rsplit(' ');
    tokens.next();
    let mut previous = tokens.next()?;
    if previous == "Mobile" {
        previous = tokens.next()?;
    }
    let version = previous.strip_prefix("Chrome/")?;
    (version_prefix(version) == version && has_major_minor(version)).then(|| components(version, 2))
}

fn opera_legacy(ua: &str) -> Option<String> {
    if !ua.starts_with("Opera/") {
        return None;
    }
    let start = ua.find("Version/")? + "Version/".len();
    let major = ua[start..].split('.').next()?;
    (major.len() == 2 && major.chars().all(|c| c.is_ascii_digit())).then(|| major.to_string())
}

fn ie11(ua: &str) -> Option<String> {
    let start = ua.find("rv:")? + "rv:".len();
    let version = version_prefix(&ua[start..]);
    let rest = &ua[start + version.len()..];
    (has_major_minor(version) && rest.starts_with(") like Gecko")).then(|| components(version, 2))
}

/// Browser name and version, rules in precedence order
fn browser_and_version(ua: &str) -> Option<(&'static str, String)> {
    if let Some(v) = chrome(ua) {
        return Some(("Chrome", v));
    }
    if let Some(v) = trailing_version(ua, "Firefox/") {
        return Some(("Firefox", components(v, 3)));
    }
    if let Some(v) = trailing_version(ua, "Safari/") {
        return Some(("Safari", components(v, 3)));
    }
    if let Some(v) = trailing_version(ua, "OPR/") {
        return Some(("Opera", v.to_string()));
    }
    if let Some(v) = opera_legacy(ua) {
        return Some(("Opera", v));
    }
    if let Some(v) = version_after(ua, "MSIE ") {
        return Some(("IE", components(v, 2)));
    }
    if let Some(v) = ie11(ua) {
        return Some(("IE", v));
    }
    if let Some(v) = version_after(ua, "IEMobile/") {
        return Some(("IE Mobile", components(v, 2)));
    }
    if let Some(v) = trailing_version(ua, "Iceape/") {
        return Some(("Iceape", components(v, 2)));
    }
    if ua.contains("Browsershots") {
        return Some(("Browsershots", "1".to_string()));
    }
    if let Some(v) = trailing_version(ua, "Midori/") {
        return Some(("Midori", components(v, 2)));
    }
    if let Some(v) = trailing_version(ua, "Konqueror/") {
        return Some(("Konqueror", components(v, 2)));
    }
    if let Some(v) = trailing_version(ua, "SeaMonkey/") {
        return Some(("SeaMonkey", components(v, 2)));
    }
    if let Some(v) = trailing_version(ua, "Epiphany/") {
        return Some(("Epiphany", components(v, 1)));
    }
    if let Some(v) = version_after(ua, "GrapeshotCrawler/") {
        return Some(("GrapeshotCrawler", components(v, 2)));
    }
    if ua.contains("WebKit") {
        return Some(("WebKit", "0".to_string()));
    }
    None
}

fn operating_system(ua: &str) -> Option<&'static str> {
    OS_SIGNATURES
        .iter()
        .find(|(signature, _)| ua.contains(signature))
        .map(|(_, os)| *os)
}

/// Table-driven classifier covering common desktop and mobile browsers
#[derive(Debug, Clone, Copy, Default)]
pub struct UserAgentClassifier;

impl AgentClassifier for UserAgentClassifier {
    fn classify(&self, user_agent: &str) -> Option<ClientDescription> {
        let user_agent = user_agent.trim();
        let os = operating_system(user_agent)?;
        let (browser, version) = browser_and_version(user_agent)?;
        Some(ClientDescription {
            browser: browser.to_string(),
            browser_version: version,
            os: os.to_string(),
        })
    }
}
