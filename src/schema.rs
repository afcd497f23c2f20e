use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PersonName {
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountDetail {
    #[schemars(description = "Lot number as written under the ACCOUNT DETAILS block")]
    pub lot_no: String,

    #[schemars(description = "Registered owner of the lot")]
    pub lot_owner: PersonName,

    #[schemars(description = "Farmer (tiller) working the lot")]
    pub farmer: PersonName,
}

/// Statement-of-account totals. Every amount is a fixed-point string with two fraction
/// digits and thousands separators; an empty string means the value could not be
/// determined.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SoaDetail {
    #[schemars(description = "Planted area in hectares")]
    pub area: String,

    #[schemars(description = "Principal due for the covered crop seasons")]
    pub principal: String,

    #[schemars(description = "Penalty accrued on the principal")]
    pub penalty: String,

    #[schemars(description = "Balance carried over from the old account")]
    pub old_account: String,

    #[schemars(description = "Total amount due")]
    pub total: String,
}

impl SoaDetail {
    pub fn is_empty(&self) -> bool {
        self.area.is_empty()
            && self.principal.is_empty()
            && self.penalty.is_empty()
            && self.old_account.is_empty()
            && self.total.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedData {
    #[schemars(description = "Numeric identifier parsed from the source filename; empty if absent")]
    pub file_id: String,

    pub account_details: Vec<AccountDetail>,

    pub soa_details: Vec<SoaDetail>,
}

impl ExtractedData {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ExtractedData)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

/// One row of the flat master list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MastersListRow {
    pub lot_code: String,
    pub crop_season: String,
    pub crop_year: String,
    pub planted_area: String,
    pub land_owner_first: String,
    pub land_owner_last: String,
    pub farmer_first: String,
    pub farmer_last: String,
    pub old_account: String,
}

/// Master-list rows sharing one lot code, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotGroup {
    pub lot_code: String,
    pub land_owner_first: String,
    pub land_owner_last: String,
    pub rows: Vec<MastersListRow>,
}
