//! Product metadata extraction from raw HTML.
//!
//! Every field is resolved by its own ordered chain of rules. The first rule
//! that yields a non-empty value wins; when none does the field is the empty
//! string. Extraction never fails: markup with nothing recognisable simply
//! produces an all-empty [`ScrapeResult`].

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

/// Best-effort summary of a product page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResult {
    pub name: String,
    pub image_url: String,
    pub description: String,
    pub price: String,
}

/// A single fallback step for one field.
pub type Rule = fn(&Html) -> Option<String>;

pub const NAME_RULES: &[Rule] = &[og_title, document_title];
pub const IMAGE_RULES: &[Rule] = &[og_image, largest_image];
pub const DESCRIPTION_RULES: &[Rule] = &[og_description, meta_description];
pub const PRICE_RULES: &[Rule] = &[product_price_meta, itemprop_price, price_class_text];

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid built-in selector {css:?}: {e:?}"))
}

static OG_TITLE: Lazy<Selector> = Lazy::new(|| selector(r#"meta[property="og:title"]"#));
static TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));
static OG_IMAGE: Lazy<Selector> = Lazy::new(|| selector(r#"meta[property="og:image"]"#));
static IMG: Lazy<Selector> = Lazy::new(|| selector("img"));
static OG_DESCRIPTION: Lazy<Selector> = Lazy::new(|| selector(r#"meta[property="og:description"]"#));
static META_DESCRIPTION: Lazy<Selector> = Lazy::new(|| selector(r#"meta[name="description"]"#));
static PRODUCT_PRICE: Lazy<Selector> = Lazy::new(|| selector(r#"meta[property="product:price:amount"]"#));
static ITEMPROP_PRICE: Lazy<Selector> = Lazy::new(|| selector(r#"[itemprop="price"]"#));
static PRICE_CLASS: Lazy<Selector> = Lazy::new(|| selector(r#"[class*="price"]"#));

/// Extracts name, image, description and price from a full HTML document.
pub fn extract(html: &str) -> ScrapeResult {
    let document = Html::parse_document(html);

    ScrapeResult {
        name: first_match(&document, NAME_RULES),
        image_url: first_match(&document, IMAGE_RULES),
        description: first_match(&document, DESCRIPTION_RULES),
        price: first_match(&document, PRICE_RULES),
    }
}

/// Runs `rules` in order and returns the first non-empty value.
pub fn first_match(document: &Html, rules: &[Rule]) -> String {
    rules
        .iter()
        .find_map(|rule| rule(document).filter(|value| !value.is_empty()))
        .unwrap_or_default()
}

fn first<'a>(document: &'a Html, selector: &Selector) -> Option<ElementRef<'a>> {
    document.select(selector).next()
}

/// `content` attribute of the first element matching `selector`.
fn first_content(document: &Html, selector: &Selector) -> Option<String> {
    first(document, selector)
        .and_then(|el| el.value().attr("content"))
        .map(str::to_string)
}

fn trimmed_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn og_title(document: &Html) -> Option<String> {
    first_content(document, &OG_TITLE)
}

fn document_title(document: &Html) -> Option<String> {
    let text: String = document.select(&TITLE).flat_map(|el| el.text()).collect();
    Some(text.trim().to_string())
}

fn og_image(document: &Html) -> Option<String> {
    first_content(document, &OG_IMAGE)
}

/// `src` of the `<img>` with the largest declared `width * height`.
/// Ties keep the element seen first.
fn largest_image(document: &Html) -> Option<String> {
    let mut best_area = 0i128;
    let mut best_src = None;

    for img in document.select(&IMG) {
        let el = img.value();
        let area = i128::from(dimension(el.attr("width"))) * i128::from(dimension(el.attr("height")));
        if area > best_area {
            best_area = area;
            best_src = el.attr("src");
        }
    }

    best_src.map(str::to_string)
}

/// Lenient integer parse of a size attribute, in the manner of `parseInt`:
/// leading whitespace is skipped, an optional sign is read, then the leading
/// run of digits. `"100px"` is 100, `"12.5"` is 12, `"-10"` is -10.
/// Missing and non-numeric values are 0.
pub fn dimension(raw: Option<&str>) -> i64 {
    let Some(raw) = raw else {
        return 0;
    };
    let raw = raw.trim_start();
    let (negative, digits) = match raw.as_bytes().first() {
        Some(b'-') => (true, &raw[1..]),
        Some(b'+') => (false, &raw[1..]),
        _ => (false, raw),
    };
    let magnitude = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, d| acc.saturating_mul(10).saturating_add(i64::from(d - b'0')));
    if negative { -magnitude } else { magnitude }
}

fn og_description(document: &Html) -> Option<String> {
    first_content(document, &OG_DESCRIPTION)
}

fn meta_description(document: &Html) -> Option<String> {
    first_content(document, &META_DESCRIPTION)
}

fn product_price_meta(document: &Html) -> Option<String> {
    first_content(document, &PRODUCT_PRICE)
}

fn itemprop_price(document: &Html) -> Option<String> {
    let el = first(document, &ITEMPROP_PRICE)?;
    match el.value().attr("content") {
        Some(content) if !content.is_empty() => Some(content.to_string()),
        _ => Some(trimmed_text(el)),
    }
}

// Matches any class containing "price", including things like
// "price-strike-through". Known to misfire on some storefronts.
fn price_class_text(document: &Html) -> Option<String> {
    first(document, &PRICE_CLASS).map(trimmed_text)
}
