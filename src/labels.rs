use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// NER categories an extractor may emit.
///
/// OntoNotes labels plus the CoNLL-only `PER` and `MISC`. The grouping
/// property of every label lives in [`EntityLabel::property`], so adding a
/// variant without a property does not compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityLabel {
    Person,
    Per,
    Norp,
    Fac,
    Org,
    Gpe,
    Loc,
    Product,
    Event,
    WorkOfArt,
    Law,
    Language,
    Date,
    Time,
    Percent,
    Money,
    Quantity,
    Ordinal,
    Cardinal,
    Misc,
}

impl EntityLabel {
    pub const ALL: [EntityLabel; 20] = [
        EntityLabel::Person,
        EntityLabel::Per,
        EntityLabel::Norp,
        EntityLabel::Fac,
        EntityLabel::Org,
        EntityLabel::Gpe,
        EntityLabel::Loc,
        EntityLabel::Product,
        EntityLabel::Event,
        EntityLabel::WorkOfArt,
        EntityLabel::Law,
        EntityLabel::Language,
        EntityLabel::Date,
        EntityLabel::Time,
        EntityLabel::Percent,
        EntityLabel::Money,
        EntityLabel::Quantity,
        EntityLabel::Ordinal,
        EntityLabel::Cardinal,
        EntityLabel::Misc,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityLabel::Person => "PERSON",
            EntityLabel::Per => "PER",
            EntityLabel::Norp => "NORP",
            EntityLabel::Fac => "FAC",
            EntityLabel::Org => "ORG",
            EntityLabel::Gpe => "GPE",
            EntityLabel::Loc => "LOC",
            EntityLabel::Product => "PRODUCT",
            EntityLabel::Event => "EVENT",
            EntityLabel::WorkOfArt => "WORK_OF_ART",
            EntityLabel::Law => "LAW",
            EntityLabel::Language => "LANGUAGE",
            EntityLabel::Date => "DATE",
            EntityLabel::Time => "TIME",
            EntityLabel::Percent => "PERCENT",
            EntityLabel::Money => "MONEY",
            EntityLabel::Quantity => "QUANTITY",
            EntityLabel::Ordinal => "ORDINAL",
            EntityLabel::Cardinal => "CARDINAL",
            EntityLabel::Misc => "MISC",
        }
    }

    /// Key used by `/entities_by_type` to group entity names.
    pub fn property(self) -> &'static str {
        match self {
            EntityLabel::Person | EntityLabel::Per => "persons",
            EntityLabel::Norp => "nationalities_or_religious_or_political_groups",
            EntityLabel::Fac => "facilities",
            EntityLabel::Org => "organizations",
            EntityLabel::Gpe | EntityLabel::Loc => "locations",
            EntityLabel::Product => "products",
            EntityLabel::Event => "events",
            EntityLabel::WorkOfArt => "works_of_art",
            EntityLabel::Law => "laws",
            EntityLabel::Language => "languages",
            EntityLabel::Date => "dates",
            EntityLabel::Time => "times",
            EntityLabel::Percent => "percentages",
            EntityLabel::Money => "money",
            EntityLabel::Quantity => "quantities",
            EntityLabel::Ordinal => "ordinals",
            EntityLabel::Cardinal => "cardinals",
            EntityLabel::Misc => "miscellaneous",
        }
    }
}

impl fmt::Display for EntityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("entity label `{0}` has no property mapping")]
pub struct UnmappedLabel(pub String);

impl FromStr for EntityLabel {
    type Err = UnmappedLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityLabel::ALL
            .iter()
            .copied()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| UnmappedLabel(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_label_it_prints() {
        for label in EntityLabel::ALL {
            assert_eq!(label.as_str().parse::<EntityLabel>(), Ok(label));
        }
    }

    #[test]
    fn serde_name_matches_as_str() {
        for label in EntityLabel::ALL {
            let json = serde_json::to_string(&label).unwrap();
            assert_eq!(json, format!("\"{}\"", label.as_str()));
        }
    }

    #[test]
    fn unknown_label_is_rejected() {
        let err = "SPECIES".parse::<EntityLabel>().unwrap_err();
        assert_eq!(err, UnmappedLabel("SPECIES".to_string()));
        assert!("person".parse::<EntityLabel>().is_err());
    }

    #[test]
    fn conll_and_ontonotes_share_properties() {
        assert_eq!(EntityLabel::Person.property(), "persons");
        assert_eq!(EntityLabel::Per.property(), "persons");
        assert_eq!(EntityLabel::Gpe.property(), EntityLabel::Loc.property());
        assert_eq!(EntityLabel::Org.property(), "organizations");
    }
}
