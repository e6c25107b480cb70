use regex::Regex;
use scraper::Selector;
use std::sync::LazyLock;

macro_rules! selector {
    ($name:ident, $css:expr) => {
        pub(crate) static $name: LazyLock<Selector> = LazyLock::new(|| Selector::parse($css).unwrap());
    };
}

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

// Heading of a group's track listing. Missing heading means unknown id.
selector!(HEADING_SELECTOR, "h2.group");
selector!(RESULTS_SELECTOR, "div.results");
regex!(FOUND_REGEX, r"Found\s+(\d{1,3}(?:,?\d{3})*)");
selector!(ROW_SELECTOR, "table.modland tr");
selector!(CELL_SELECTOR, "td");
selector!(LINK_SELECTOR, "a[href]");
regex!(GROUP_ID_REGEX, r"[?&]id=(\d+)(?:$|&|#)");
selector!(NEXT_SELECTOR, "a.next[href]");
