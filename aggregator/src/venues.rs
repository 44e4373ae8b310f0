// Venue registry module
// Identifiers of the swap venues the routing service may use, plus the
// reserved ids and contracts the execution engine relies on
//
// Numan Thabit 2025 Nov

/// Venue id that marks a route settled through signed intents instead of transactions.
pub const NEAR_INTENTS_VENUE: &str = "NearIntents";

/// Recipient of NEP-413 intent signatures.
pub const INTENTS_CONTRACT: &str = "intents.near";

/// Wrapped-native token contract.
pub const WRAP_CONTRACT: &str = "wrap.near";

/// Venues queried when the caller does not supply an allow-list.
pub const DEFAULT_DEXES: &[&str] = &[
    "Rhea", "Veax", "Aidols", "GraFun", "RheaDcl", "Wrap", "MetaPool", "Linear",
];

pub fn is_intents_venue(venue: &str) -> bool {
    venue == NEAR_INTENTS_VENUE
}

pub fn default_dexes() -> Vec<String> {
    DEFAULT_DEXES.iter().map(|d| d.to_string()).collect()
}
