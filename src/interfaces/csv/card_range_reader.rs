use crate::domain::card_range::{
    AccountNumber, ActionIndicator, CardRange, CardRangeWrite, ProtocolVersion, RangeKey,
};
use crate::error::{Result, ThreeDsError};
use serde::Deserialize;
use std::io::Read;

/// One line of a card range CSV file.
///
/// `original_*` columns are only read for `M` rows, protocol versions and the
/// method URL only for `A` and `M` rows. DS versions default to the ACS ones.
#[derive(Debug, Clone, Deserialize)]
pub struct CardRangeRow {
    pub action: ActionIndicator,
    pub acs_id: String,
    pub start_range: AccountNumber,
    pub end_range: AccountNumber,
    #[serde(default)]
    pub acs_start_version: Option<ProtocolVersion>,
    #[serde(default)]
    pub acs_end_version: Option<ProtocolVersion>,
    #[serde(default)]
    pub ds_start_version: Option<ProtocolVersion>,
    #[serde(default)]
    pub ds_end_version: Option<ProtocolVersion>,
    #[serde(default)]
    pub method_url: Option<String>,
    #[serde(default)]
    pub original_start_range: Option<AccountNumber>,
    #[serde(default)]
    pub original_end_range: Option<AccountNumber>,
}

impl CardRangeRow {
    fn range(&self) -> Result<CardRange> {
        let (Some(start), Some(end)) = (self.acs_start_version, self.acs_end_version) else {
            return Err(ThreeDsError::Validation(format!(
                "range {}-{} has no ACS protocol versions",
                self.start_range, self.end_range
            )));
        };
        let mut range = CardRange::new(
            self.acs_id.clone(),
            self.start_range.clone(),
            self.end_range.clone(),
            start,
            end,
        );
        range.ds_start_protocol_version = self.ds_start_version.or(Some(start));
        range.ds_end_protocol_version = self.ds_end_version.or(Some(end));
        range.three_ds_method_url = self.method_url.clone().filter(|url| !url.is_empty());
        range.action_ind = Some(self.action);
        Ok(range)
    }

    fn key(&self) -> RangeKey {
        RangeKey {
            acs_id: self.acs_id.clone(),
            start_range: self.start_range.clone(),
            end_range: self.end_range.clone(),
        }
    }
}

impl TryFrom<CardRangeRow> for CardRangeWrite {
    type Error = ThreeDsError;

    fn try_from(row: CardRangeRow) -> Result<Self> {
        match row.action {
            ActionIndicator::Add => Ok(CardRangeWrite::Add(row.range()?)),
            ActionIndicator::Modify => {
                let (Some(start), Some(end)) =
                    (row.original_start_range.clone(), row.original_end_range.clone())
                else {
                    return Err(ThreeDsError::Validation(format!(
                        "modify row for {}-{} has no original boundaries",
                        row.start_range, row.end_range
                    )));
                };
                Ok(CardRangeWrite::Modify {
                    original: RangeKey {
                        acs_id: row.acs_id.clone(),
                        start_range: start,
                        end_range: end,
                    },
                    replacement: row.range()?,
                })
            }
            ActionIndicator::Delete => Ok(CardRangeWrite::Delete(row.key())),
        }
    }
}

/// Reads card range writes from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record lengths,
/// so trailing optional columns may be left out.
pub struct CardRangeReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CardRangeReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and converts each row. A bad row yields an error and
    /// does not stop the stream.
    pub fn writes(self) -> impl Iterator<Item = Result<CardRangeWrite>> {
        self.reader.into_deserialize().map(|result| {
            let row: CardRangeRow = result.map_err(ThreeDsError::from)?;
            CardRangeWrite::try_from(row)
        })
    }
}
