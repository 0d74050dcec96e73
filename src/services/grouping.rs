//! Arranges a push's jobs into platform rows and job groups.
//!
//! Ordering is deterministic for any input order:
//! - platforms by their position in [`PLATFORM_NAMES`], then build option,
//!   with unknown platforms last in discovery order
//! - groups by `symbol length + tier`, stable
//! - jobs by type symbol with digit runs compared numerically, then id

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::{Group, Job, Platform};

/// Raw platform identifier to display name, in display order.
pub const PLATFORM_NAMES: &[(&str, &str)] = &[
    ("linux32", "Linux"),
    ("linux32-devedition", "Linux DevEdition"),
    ("linux-shippable", "Linux Shippable"),
    ("linux32-shippable", "Linux Shippable"),
    ("linux1804-32", "Linux 18.04"),
    ("linux1804-32-shippable", "Linux 18.04 Shippable"),
    ("linux64", "Linux x64"),
    ("linux1804-64-tsan", "Linux 18.04 x64 tsan"),
    ("linux64-asan", "Linux x64 asan"),
    ("linux64-asan-qr", "Linux x64 WebRender asan"),
    ("linux64-add-on-devel", "Linux x64 addon"),
    ("linux64-devedition", "Linux x64 DevEdition"),
    ("linux64-qr", "Linux x64 WebRender"),
    ("linux64-shippable", "Linux x64 Shippable"),
    ("linux64-shippable-qr", "Linux x64 WebRender Shippable"),
    ("linux64-ccov", "Linux x64 CCov"),
    ("linux64-noopt", "Linux x64 NoOpt"),
    ("linux64-aarch64", "Linux AArch64"),
    ("linux1804-64", "Linux 18.04 x64"),
    ("linux1804-64-asan", "Linux 18.04 x64 asan"),
    ("linux1804-64-qr", "Linux 18.04 x64 WebRender"),
    ("linux1804-64-shippable", "Linux 18.04 x64 Shippable"),
    ("linux1804-64-shippable-qr", "Linux 18.04 x64 WebRender Shippable"),
    ("linux1804-64-ccov", "Linux 18.04 x64 CCov"),
    ("osx-cross", "OS X Cross Compiled"),
    ("osx-shippable", "OS X Cross Compiled Shippable"),
    ("osx-aarch64-shippable", "OS X AArch64 Cross Compiled Shippable"),
    ("osx-cross-noopt", "OS X Cross Compiled NoOpt"),
    ("osx-cross-ccov", "OS X Cross Compiled CCov"),
    ("osx-cross-devedition", "OS X Cross Compiled DevEdition"),
    ("macosx1014-64", "OS X 10.14"),
    ("osx-1014-64", "OS X 10.14"),
    ("macosx1014-64-shippable", "OS X 10.14 Shippable"),
    ("macosx1015-64", "OS X 10.15"),
    ("macosx1015-64-qr", "OS X 10.15 WebRender"),
    ("macosx1015-64-shippable", "OS X 10.15 Shippable"),
    ("macosx1100-64", "OS X 11"),
    ("macosx1100-64-shippable", "OS X 11 Shippable"),
    ("macosx64", "OS X"),
    ("osx", "OS X"),
    ("macosx64-aarch64", "OS X AArch64"),
    ("windows7-32", "Windows 7"),
    ("windows7-32-shippable", "Windows 7 Shippable"),
    ("windows7-32-mingwclang", "Windows 7 MinGW"),
    ("windows10-32", "Windows 10 x86"),
    ("windows10-32-shippable", "Windows 10 x86 Shippable"),
    ("windows10-64", "Windows 10 x64"),
    ("windows10-64-ccov", "Windows 10 x64 CCov"),
    ("windows10-64-devedition", "Windows 10 x64 DevEdition"),
    ("windows10-64-shippable", "Windows 10 x64 Shippable"),
    ("windows10-64-qr", "Windows 10 x64 WebRender"),
    ("windows10-64-shippable-qr", "Windows 10 x64 WebRender Shippable"),
    ("windows10-64-ref-hw-2017", "Windows 10 x64 2017 Ref HW"),
    ("windows10-64-mingwclang", "Windows 10 x64 MinGW"),
    ("windows10-aarch64", "Windows 10 AArch64"),
    ("windows2012-32", "Windows 2012"),
    ("windows2012-32-shippable", "Windows 2012 Shippable"),
    ("windows2012-64", "Windows 2012 x64"),
    ("windows2012-64-shippable", "Windows 2012 x64 Shippable"),
    ("windows2012-aarch64", "Windows 2012 AArch64"),
    ("windows-mingw32", "Windows MinGW"),
    ("win32", "Windows x86"),
    ("win64", "Windows x64"),
    ("android-4-0-armv7-api16", "Android 4.0 API16+"),
    ("android-4-0-armv7-api16-shippable", "Android 4.0 API16+ Shippable"),
    ("android-4-2-x86", "Android 4.2 x86"),
    ("android-5-0-aarch64", "Android 5.0 AArch64"),
    ("android-5-0-x86_64", "Android 5.0 x86-64"),
    ("android-em-7-0-x86", "Android 7.0 x86"),
    ("android-em-7-0-x86_64", "Android 7.0 x86-64"),
    ("android-em-7-0-x86_64-qr", "Android 7.0 x86-64 WebRender"),
    ("android-em-7-0-x86_64-shippable", "Android 7.0 x86-64 Shippable"),
    ("android-hw-g5-7-0-arm7", "Android 7.0 MotoG5"),
    ("android-hw-p2-8-0-arm7", "Android 8.0 Pixel2"),
    ("android-hw-p2-8-0-android-aarch64", "Android 8.0 Pixel2 AArch64"),
    ("Android", "Android"),
    ("gecko-decision", "Gecko Decision Task"),
    ("firefox-release", "Firefox Release Tasks"),
    ("devedition-release", "Devedition Release Tasks"),
    ("fennec-beta", "Fennec Beta Tasks"),
    ("fennec-release", "Fennec Release Tasks"),
    ("thunderbird-release", "Thunderbird Release Tasks"),
    ("diff", "Diffoscope"),
    ("lint", "Linting"),
    ("doc", "Documentation"),
    ("fetch", "Fetch"),
    ("taskcluster-images", "Docker Images"),
    ("packages", "Packages"),
    ("toolchains", "Toolchains"),
    ("updatebot", "Updatebot"),
    ("other", "Other"),
];

/// Platforms whose title drops the `opt` suffix.
const SIMPLE_PLATFORMS: &[&str] = &[
    "gecko-decision",
    "firefox-release",
    "devedition-release",
    "fennec-beta",
    "fennec-release",
    "thunderbird-release",
    "lint",
    "doc",
    "taskcluster-images",
    "packages",
    "toolchains",
    "diff",
];

/// Build option rank; anything unlisted sorts after these.
const OPTION_ORDER: &[(&str, u32)] = &[
    ("opt", 1),
    ("pgo", 2),
    ("asan", 3),
    ("tsan", 4),
    ("debug", 5),
    ("cc", 6),
    ("addon", 7),
    ("all", 8),
    ("debug-isolated-process", 9),
];

const UNRANKED_OPTION: u32 = 10;

static DIGIT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("digit pattern is valid"));

/// Display name for a raw platform, or the raw name when unmapped.
pub fn platform_display_name(raw: &str) -> &str {
    PLATFORM_NAMES
        .iter()
        .find(|(name, _)| *name == raw)
        .map(|(_, display)| *display)
        .unwrap_or(raw)
}

/// Position of the first table entry showing this display name.
fn platform_rank(display: &str) -> Option<usize> {
    PLATFORM_NAMES.iter().position(|(_, name)| *name == display)
}

fn option_rank(option: &str) -> u32 {
    OPTION_ORDER
        .iter()
        .find(|(name, _)| *name == option)
        .map(|(_, rank)| *rank)
        .unwrap_or(UNRANKED_OPTION)
}

/// The "no group" marker `?` groups the same as an empty symbol.
pub fn normalize_group_symbol(symbol: &str) -> &str {
    if symbol == "?" { "" } else { symbol }
}

/// Zero-pad every digit run to at least three digits so `R2` sorts before
/// `R10`. Longer runs are kept whole.
pub fn pad_symbol(symbol: &str) -> String {
    DIGIT_RUN
        .replace_all(symbol, |caps: &regex::Captures| format!("{:0>3}", &caps[0]))
        .into_owned()
}

pub fn platform_title(raw_name: &str, option: &str) -> String {
    let display = platform_display_name(raw_name);
    if option.is_empty() || (SIMPLE_PLATFORMS.contains(&raw_name) && option == "opt") {
        display.to_string()
    } else {
        format!("{} {}", display, option)
    }
}

fn group_map_key(push_id: i64, symbol: &str, tier: i64, platform: &str, option: &str) -> String {
    format!("{}-{}-{}-{}-{}", push_id, symbol, tier, platform, option)
}

/// Build the platform/group tree for one push.
pub fn group_jobs(push_id: i64, jobs: &[Job]) -> Vec<Platform> {
    let mut platforms: Vec<Platform> = Vec::new();
    let mut platform_slots: HashMap<(String, String), usize> = HashMap::new();
    let mut group_slots: Vec<HashMap<(String, i64), usize>> = Vec::new();

    for job in jobs {
        let display = platform_display_name(&job.platform).to_string();
        let platform_key = (display.clone(), job.platform_option.clone());
        let platform_idx = *platform_slots.entry(platform_key).or_insert_with(|| {
            platforms.push(Platform {
                name: display,
                raw_name: job.platform.clone(),
                option: job.platform_option.clone(),
                title: platform_title(&job.platform, &job.platform_option),
                groups: Vec::new(),
                visible: false,
            });
            group_slots.push(HashMap::new());
            platforms.len() - 1
        });

        let symbol = normalize_group_symbol(&job.job_group_symbol).to_string();
        let platform = &mut platforms[platform_idx];
        let group_idx = *group_slots[platform_idx]
            .entry((symbol.clone(), job.tier))
            .or_insert_with(|| {
                platform.groups.push(Group {
                    name: job.job_group_name.clone(),
                    map_key: group_map_key(
                        push_id,
                        &symbol,
                        job.tier,
                        &platform.raw_name,
                        &platform.option,
                    ),
                    symbol,
                    tier: job.tier,
                    jobs: Vec::new(),
                    visible: false,
                });
                platform.groups.len() - 1
            });
        platform.groups[group_idx].jobs.push(job.id);
    }

    let sort_keys: HashMap<i64, (String, i64)> = jobs
        .iter()
        .map(|job| (job.id, (pad_symbol(&job.job_type_symbol), job.id)))
        .collect();

    for platform in platforms.iter_mut() {
        platform
            .groups
            .sort_by_key(|group| group.symbol.chars().count() as i64 + group.tier);
        for group in platform.groups.iter_mut() {
            group.jobs.sort_by(|a, b| sort_keys[a].cmp(&sort_keys[b]));
        }
    }

    sort_platforms(&mut platforms);
    platforms
}

fn sort_platforms(platforms: &mut [Platform]) {
    platforms.sort_by(|a, b| {
        let rank = |p: &Platform| {
            platform_rank(&p.name).map(|idx| idx as u64 * 100 + option_rank(&p.option) as u64)
        };
        match (rank(a), rank(b)) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: i64, platform: &str, option: &str, group: &str, symbol: &str) -> Job {
        Job {
            id,
            platform: platform.into(),
            platform_option: option.into(),
            job_group_symbol: group.into(),
            job_type_symbol: symbol.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_numeric_aware_symbol_order() {
        let jobs = vec![
            job(1, "linux64", "opt", "M", "R1"),
            job(2, "linux64", "opt", "M", "R10"),
            job(3, "linux64", "opt", "M", "R2"),
        ];
        let platforms = group_jobs(9, &jobs);
        assert_eq!(platforms[0].groups[0].jobs, vec![1, 3, 2]);
    }

    #[test]
    fn test_pad_symbol_keeps_long_runs() {
        assert_eq!(pad_symbol("R2"), "R002");
        assert_eq!(pad_symbol("bc12-e10s4"), "bc012-e010s004");
        assert_eq!(pad_symbol("wpt12345"), "wpt12345");
    }

    #[test]
    fn test_platform_order_by_table_then_option() {
        let jobs = vec![
            job(1, "windows10-64", "opt", "", "B"),
            job(2, "linux64", "debug", "", "B"),
            job(3, "mystery-os", "opt", "", "B"),
            job(4, "linux64", "opt", "", "B"),
            job(5, "linux32", "opt", "", "B"),
        ];
        let titles: Vec<String> = group_jobs(1, &jobs)
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(
            titles,
            vec![
                "Linux opt",
                "Linux x64 opt",
                "Linux x64 debug",
                "Windows 10 x64 opt",
                "mystery-os opt"
            ]
        );
    }

    #[test]
    fn test_unknown_platforms_keep_discovery_order() {
        let jobs = vec![
            job(1, "zeta", "opt", "", "B"),
            job(2, "alpha", "opt", "", "B"),
        ];
        let names: Vec<String> = group_jobs(1, &jobs).into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_question_mark_group_merges_with_ungrouped() {
        let jobs = vec![
            job(1, "linux64", "opt", "?", "B"),
            job(2, "linux64", "opt", "", "Bb"),
        ];
        let platforms = group_jobs(1, &jobs);
        assert_eq!(platforms[0].groups.len(), 1);
        assert_eq!(platforms[0].groups[0].symbol, "");
        assert_eq!(platforms[0].groups[0].jobs, vec![1, 2]);
    }

    #[test]
    fn test_group_order_by_symbol_length_plus_tier() {
        let mut tier2 = job(1, "linux64", "opt", "M", "1");
        tier2.tier = 2;
        let jobs = vec![
            job(2, "linux64", "opt", "M-e10s", "1"),
            tier2,
            job(3, "linux64", "opt", "M", "2"),
            job(4, "linux64", "opt", "", "B"),
        ];
        let platform = &group_jobs(1, &jobs)[0];
        let keys: Vec<(String, i64)> = platform
            .groups
            .iter()
            .map(|g| (g.symbol.clone(), g.tier))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("".to_string(), 1),
                ("M".to_string(), 1),
                ("M".to_string(), 2),
                ("M-e10s".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_ordering_independent_of_arrival_order() {
        let mut jobs = vec![
            job(10, "linux64", "opt", "M", "R3"),
            job(11, "windows10-64", "debug", "", "B"),
            job(12, "linux64", "opt", "M", "R1"),
            job(13, "linux64", "debug", "M", "R1"),
        ];
        let forward = group_jobs(1, &jobs);
        jobs.reverse();
        let backward = group_jobs(1, &jobs);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_simple_platform_title_drops_opt() {
        assert_eq!(platform_title("gecko-decision", "opt"), "Gecko Decision Task");
        assert_eq!(platform_title("linux64", "opt"), "Linux x64 opt");
        assert_eq!(platform_title("lint", "debug"), "Linting debug");
    }
}
