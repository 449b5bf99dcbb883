//! Built-in merchant reference data and seed-file loading
//!
//! Seeding is an offline step: the request path never creates merchants.

use std::path::Path;

use crate::error::{Error, Result};
use crate::models::{Merchant, MerchantLocation};

fn merchant(
    guid: &str,
    name: &str,
    website: &str,
    category_codes: &[u32],
    patterns: &[&str],
) -> Merchant {
    Merchant {
        guid: guid.to_string(),
        name: name.to_string(),
        logo_url: None,
        website_url: Some(format!("https://www.{}", website)),
        category_codes: category_codes.to_vec(),
        patterns: patterns.iter().map(|p| p.to_string()).collect(),
        locations: Vec::new(),
    }
}

#[allow(clippy::too_many_arguments)]
fn location(
    guid: &str,
    merchant_guid: &str,
    address: &str,
    city: &str,
    state: &str,
    postal_code: &str,
    latitude: f64,
    longitude: f64,
) -> MerchantLocation {
    MerchantLocation {
        guid: guid.to_string(),
        merchant_guid: merchant_guid.to_string(),
        address: Some(address.to_string()),
        city: Some(city.to_string()),
        state: Some(state.to_string()),
        postal_code: Some(postal_code.to_string()),
        country: Some("US".to_string()),
        latitude: Some(latitude),
        longitude: Some(longitude),
        phone: None,
    }
}

/// The merchant set shipped with the service
///
/// Order matters for category codes: the first merchant listing a code owns it.
pub fn builtin_merchants() -> Vec<Merchant> {
    let mut starbucks = merchant(
        "MER-STARBUCKS",
        "Starbucks",
        "starbucks.com",
        &[5814],
        &["sbux", "starbucks", "starbucks store"],
    );
    starbucks.locations = vec![
        location(
            "LOC-SBUX-PIKE",
            "MER-STARBUCKS",
            "1912 Pike Pl",
            "Seattle",
            "WA",
            "98101",
            47.6097,
            -122.3422,
        ),
        location(
            "LOC-SBUX-MARKET",
            "MER-STARBUCKS",
            "1 Market St",
            "San Francisco",
            "CA",
            "94105",
            37.7940,
            -122.3950,
        ),
    ];

    let mut whole_foods = merchant(
        "MER-WHOLE-FOODS",
        "Whole Foods",
        "wholefoodsmarket.com",
        &[5411],
        &["wholefds", "whole foods", "whole foods market"],
    );
    whole_foods.locations = vec![location(
        "LOC-WFM-SOMA",
        "MER-WHOLE-FOODS",
        "399 4th St",
        "San Francisco",
        "CA",
        "94107",
        37.7808,
        -122.3990,
    )];

    vec![
        merchant("MER-NETFLIX", "Netflix", "netflix.com", &[4899], &["netflix", "netflix com"]),
        merchant("MER-SPOTIFY", "Spotify", "spotify.com", &[], &["spotify", "spotify usa"]),
        merchant("MER-HULU", "Hulu", "hulu.com", &[], &["hulu", "hulu com", "hulucom"]),
        merchant("MER-DISNEY-PLUS", "Disney+", "disneyplus.com", &[], &["disney plus", "disneyplus"]),
        merchant(
            "MER-AMAZON-MARKETPLACE",
            "Amazon Marketplace",
            "amazon.com",
            &[5942],
            &["amzn mktp", "amazon mktpl", "amazon marketplace"],
        ),
        merchant(
            "MER-AMAZON",
            "Amazon",
            "amazon.com",
            &[5999],
            &["amzn", "amazon", "amazoncom"],
        ),
        merchant("MER-AMAZON-PRIME", "Amazon Prime", "amazon.com", &[], &["amzn prime", "amazon prime"]),
        starbucks,
        merchant("MER-DUNKIN", "Dunkin'", "dunkindonuts.com", &[], &["dunkin", "dunkin donuts"]),
        merchant("MER-MCDONALDS", "McDonald's", "mcdonalds.com", &[5812], &["mcdonald", "mcdonalds"]),
        merchant("MER-CHIPOTLE", "Chipotle", "chipotle.com", &[], &["chipotle"]),
        whole_foods,
        merchant("MER-TRADER-JOES", "Trader Joe's", "traderjoes.com", &[], &["trader joe", "trader joes"]),
        merchant("MER-KROGER", "Kroger", "kroger.com", &[], &["kroger"]),
        merchant("MER-SAFEWAY", "Safeway", "safeway.com", &[], &["safeway"]),
        merchant("MER-COSTCO", "Costco", "costco.com", &[5300], &["costco", "costco whse"]),
        merchant(
            "MER-WALMART",
            "Walmart",
            "walmart.com",
            &[5310],
            &["wal mart", "walmart", "wm supercenter"],
        ),
        merchant("MER-TARGET", "Target", "target.com", &[5311], &["target"]),
        merchant("MER-SHELL", "Shell", "shell.us", &[5541], &["shell", "shell oil"]),
        merchant("MER-CHEVRON", "Chevron", "chevron.com", &[5542], &["chevron"]),
        merchant("MER-EXXONMOBIL", "ExxonMobil", "exxon.com", &[], &["exxon", "exxonmobil", "mobil"]),
        merchant("MER-CVS", "CVS Pharmacy", "cvs.com", &[5912], &["cvs", "cvs pharmacy"]),
        merchant("MER-WALGREENS", "Walgreens", "walgreens.com", &[], &["walgreens"]),
        merchant("MER-UBER", "Uber", "uber.com", &[4121], &["uber", "uber trip"]),
        merchant("MER-UBER-EATS", "Uber Eats", "ubereats.com", &[], &["uber eats", "ubereats"]),
        merchant("MER-LYFT", "Lyft", "lyft.com", &[], &["lyft", "lyft ride"]),
        merchant("MER-DOORDASH", "DoorDash", "doordash.com", &[], &["doordash", "dd doordash"]),
        merchant(
            "MER-VERIZON-WIRELESS",
            "Verizon Wireless",
            "verizon.com",
            &[4814],
            &["vzwrlss", "verizon wireless"],
        ),
        merchant("MER-COMCAST", "Comcast", "xfinity.com", &[4899], &["comcast", "xfinity"]),
        merchant("MER-GEICO", "GEICO", "geico.com", &[6300], &["geico"]),
        merchant("MER-PLANET-FITNESS", "Planet Fitness", "planetfitness.com", &[7997], &["planet fit", "planet fitness"]),
        merchant("MER-DELTA", "Delta Air Lines", "delta.com", &[3058], &["delta air", "delta airlines"]),
        merchant("MER-MARRIOTT", "Marriott", "marriott.com", &[3509], &["marriott"]),
        merchant("MER-GITHUB", "GitHub", "github.com", &[], &["github"]),
    ]
}

/// Read a JSON array of merchants from disk
pub fn load_merchants_file(path: &Path) -> Result<Vec<Merchant>> {
    let content = std::fs::read_to_string(path)?;
    let merchants: Vec<Merchant> = serde_json::from_str(&content)?;
    if let Some(bad) = merchants
        .iter()
        .find(|m| m.guid.trim().is_empty() || m.name.trim().is_empty())
    {
        return Err(Error::InvalidInput(format!(
            "merchant entry missing guid or name: {:?}",
            bad.guid
        )));
    }
    Ok(merchants)
}
