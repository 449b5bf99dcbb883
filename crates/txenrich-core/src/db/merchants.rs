//! Merchant index operations

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::Database;
use crate::error::{Error, Result};
use crate::matcher::{normalize_name, MerchantIndex};
use crate::models::{Merchant, MerchantLocation};

fn location_from_row(row: &rusqlite::Row) -> rusqlite::Result<MerchantLocation> {
    Ok(MerchantLocation {
        guid: row.get(0)?,
        merchant_guid: row.get(1)?,
        address: row.get(2)?,
        city: row.get(3)?,
        state: row.get(4)?,
        postal_code: row.get(5)?,
        country: row.get(6)?,
        latitude: row.get(7)?,
        longitude: row.get(8)?,
        phone: row.get(9)?,
    })
}

fn locations_for(conn: &Connection, merchant_guid: &str) -> Result<Vec<MerchantLocation>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT guid, merchant_guid, address, city, state, postal_code, country, latitude, longitude, phone
        FROM merchant_locations
        WHERE merchant_guid = ?
        ORDER BY guid
        "#,
    )?;
    let locations = stmt
        .query_map(params![merchant_guid], location_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(locations)
}

/// Load a merchant record together with its locations
fn load_merchant(conn: &Connection, guid: &str) -> Result<Option<Merchant>> {
    let row = conn
        .query_row(
            "SELECT guid, name, logo_url, website_url, category_codes, patterns FROM merchants WHERE guid = ?",
            params![guid],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            },
        )
        .optional()?;

    let Some((guid, name, logo_url, website_url, codes_json, patterns_json)) = row else {
        return Ok(None);
    };

    Ok(Some(Merchant {
        locations: locations_for(conn, &guid)?,
        guid,
        name,
        logo_url,
        website_url,
        category_codes: serde_json::from_str(&codes_json)?,
        patterns: serde_json::from_str(&patterns_json)?,
    }))
}

/// Follow a secondary key table to the merchant it points at
fn load_by_key(conn: &Connection, sql: &str, key: &dyn rusqlite::ToSql) -> Result<Option<Merchant>> {
    let guid: Option<String> = conn.query_row(sql, params![key], |row| row.get(0)).optional()?;
    match guid {
        Some(guid) => load_merchant(conn, &guid),
        None => Ok(None),
    }
}

impl Database {
    /// Insert or replace a merchant and rebuild its secondary keys
    ///
    /// Name and pattern keys are last-write-wins across merchants; a category
    /// code keeps the first merchant registered for it.
    pub fn upsert_merchant(&self, merchant: &Merchant) -> Result<()> {
        if merchant.guid.trim().is_empty() || merchant.name.trim().is_empty() {
            return Err(Error::InvalidInput(
                "merchant guid and name are required".to_string(),
            ));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO merchants (guid, name, logo_url, website_url, category_codes, patterns)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(guid) DO UPDATE SET
                name = excluded.name,
                logo_url = excluded.logo_url,
                website_url = excluded.website_url,
                category_codes = excluded.category_codes,
                patterns = excluded.patterns,
                updated_at = CURRENT_TIMESTAMP
            "#,
            params![
                merchant.guid,
                merchant.name,
                merchant.logo_url,
                merchant.website_url,
                serde_json::to_string(&merchant.category_codes)?,
                serde_json::to_string(&merchant.patterns)?,
            ],
        )?;

        for table in [
            "merchant_names",
            "merchant_patterns",
            "merchant_category_codes",
            "merchant_locations",
        ] {
            tx.execute(
                &format!("DELETE FROM {} WHERE merchant_guid = ?", table),
                params![merchant.guid],
            )?;
        }

        let name_key = normalize_name(&merchant.name);
        if !name_key.is_empty() {
            tx.execute(
                "INSERT OR REPLACE INTO merchant_names (normalized_name, merchant_guid) VALUES (?, ?)",
                params![name_key, merchant.guid],
            )?;
        }

        for pattern in &merchant.patterns {
            let key = normalize_name(pattern);
            if key.is_empty() {
                continue;
            }
            tx.execute(
                "INSERT OR REPLACE INTO merchant_patterns (pattern, merchant_guid) VALUES (?, ?)",
                params![key, merchant.guid],
            )?;
        }

        for code in &merchant.category_codes {
            tx.execute(
                "INSERT OR IGNORE INTO merchant_category_codes (code, merchant_guid) VALUES (?, ?)",
                params![code, merchant.guid],
            )?;
        }

        for location in &merchant.locations {
            tx.execute(
                r#"
                INSERT OR REPLACE INTO merchant_locations
                    (guid, merchant_guid, address, city, state, postal_code, country, latitude, longitude, phone)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
                params![
                    location.guid,
                    merchant.guid,
                    location.address,
                    location.city,
                    location.state,
                    location.postal_code,
                    location.country,
                    location.latitude,
                    location.longitude,
                    location.phone,
                ],
            )?;
        }

        tx.commit()?;
        debug!(merchant = %merchant.guid, "Upserted merchant");
        Ok(())
    }

    /// Load a batch of merchants, returning how many were written
    pub fn seed_merchants(&self, merchants: &[Merchant]) -> Result<usize> {
        for merchant in merchants {
            self.upsert_merchant(merchant)?;
        }
        Ok(merchants.len())
    }

    pub fn get_merchant(&self, guid: &str) -> Result<Option<Merchant>> {
        let conn = self.lookup_conn()?;
        load_merchant(&conn, guid)
    }

    /// Look up by an already-normalized name key
    pub fn find_merchant_by_name(&self, normalized: &str) -> Result<Option<Merchant>> {
        let conn = self.lookup_conn()?;
        load_by_key(
            &conn,
            "SELECT merchant_guid FROM merchant_names WHERE normalized_name = ?",
            &normalized,
        )
    }

    /// Look up by an already-normalized pattern key
    pub fn find_merchant_by_pattern(&self, pattern: &str) -> Result<Option<Merchant>> {
        let conn = self.lookup_conn()?;
        load_by_key(
            &conn,
            "SELECT merchant_guid FROM merchant_patterns WHERE pattern = ?",
            &pattern,
        )
    }

    pub fn find_merchant_by_category_code(&self, code: u32) -> Result<Option<Merchant>> {
        let conn = self.lookup_conn()?;
        load_by_key(
            &conn,
            "SELECT merchant_guid FROM merchant_category_codes WHERE code = ?",
            &code,
        )
    }

    /// Flat `(name, guid)` list used by fuzzy matching
    pub fn list_merchant_names(&self) -> Result<Vec<(String, String)>> {
        let conn = self.lookup_conn()?;
        let mut stmt = conn.prepare("SELECT name, guid FROM merchants ORDER BY name")?;
        let names = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    pub fn list_merchant_locations(&self, merchant_guid: &str) -> Result<Vec<MerchantLocation>> {
        let conn = self.lookup_conn()?;
        locations_for(&conn, merchant_guid)
    }

    pub fn count_merchants(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM merchants", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl MerchantIndex for Database {
    fn by_name(&self, normalized: &str) -> Result<Option<Merchant>> {
        self.find_merchant_by_name(normalized)
    }

    fn by_pattern(&self, pattern: &str) -> Result<Option<Merchant>> {
        self.find_merchant_by_pattern(pattern)
    }

    fn by_category_code(&self, code: u32) -> Result<Option<Merchant>> {
        self.find_merchant_by_category_code(code)
    }

    fn names(&self) -> Result<Vec<(String, String)>> {
        self.list_merchant_names()
    }

    fn by_guid(&self, guid: &str) -> Result<Option<Merchant>> {
        self.get_merchant(guid)
    }
}
