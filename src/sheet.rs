use csv::ReaderBuilder;

use crate::error::SheetError;

/// Currency glyphs that may prefix spreadsheet cells.
const CURRENCY_GLYPHS: [char; 4] = ['₹', '$', '€', '£'];

/// A named tab of the published spreadsheet, fully materialized as text.
///
/// Every cell is kept as a string so locale-formatted numbers survive the
/// trip untouched; callers go through [`coerce_number`] when they need math.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Sheet {
    /// Parse CSV text into a cleaned sheet.
    ///
    /// Rows are padded or truncated to the header width, then placeholder
    /// columns (empty or "Unnamed" export artifacts) and columns without a
    /// single non-empty cell are dropped.
    pub fn from_csv(name: &str, text: &str) -> Result<Sheet, SheetError> {
        if text.trim().is_empty() {
            return Err(SheetError::EmptySheet(name.to_string()));
        }

        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .from_reader(text.as_bytes());

        let columns: Vec<String> = reader
            .headers()
            .map_err(|source| SheetError::Csv {
                name: name.to_string(),
                source,
            })?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        if columns.is_empty() {
            return Err(SheetError::EmptySheet(name.to_string()));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|source| SheetError::Csv {
                name: name.to_string(),
                source,
            })?;
            let mut row: Vec<String> = record.iter().map(|c| c.to_string()).collect();
            // Missing trailing cells become empty strings; extras are dropped
            row.resize(columns.len(), String::new());
            rows.push(row);
        }

        Ok(Sheet {
            name: name.to_string(),
            columns,
            rows,
        }
        .clean())
    }

    /// Drop anonymous/placeholder columns and fully-empty columns.
    fn clean(self) -> Sheet {
        let keep: Vec<usize> = (0..self.columns.len())
            .filter(|&i| {
                let header = &self.columns[i];
                if header.is_empty() || header.starts_with("Unnamed") {
                    return false;
                }
                // A named column with data rows but no content is dead weight
                if !self.rows.is_empty() && self.rows.iter().all(|r| r[i].is_empty()) {
                    return false;
                }
                true
            })
            .collect();

        if keep.len() == self.columns.len() {
            return self;
        }

        let columns = keep.iter().map(|&i| self.columns[i].clone()).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| keep.iter().map(|&i| row[i].clone()).collect())
            .collect();

        Sheet {
            name: self.name,
            columns,
            rows,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn first_row(&self) -> Option<&[String]> {
        self.rows.first().map(|r| r.as_slice())
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// All cell values of a named column, top to bottom.
    ///
    /// Returns `None` when the column does not exist; an existing column in
    /// an empty sheet yields an empty vector.
    pub fn column_values(&self, column: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(column)?;
        Some(self.rows.iter().map(|r| r[idx].as_str()).collect())
    }
}

/// Coerce a currency/percent-formatted text cell into a number.
///
/// Strips currency glyphs, thousands-separator commas, percent signs and
/// whitespace, then parses the remainder as f64. Anything unparseable comes
/// back as 0.0, so an explicit zero and junk text are indistinguishable;
/// callers tolerate that.
pub fn coerce_number(cell: &str) -> f64 {
    let cleaned: String = cell
        .chars()
        .filter(|c| !c.is_whitespace() && !CURRENCY_GLYPHS.contains(c) && *c != ',' && *c != '%')
        .collect();
    cleaned.parse().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_currency_cells() {
        assert_eq!(coerce_number("₹1,234.56"), 1234.56);
        assert_eq!(coerce_number("-₹40.00"), -40.0);
        assert_eq!(coerce_number("₹0"), 0.0);
        assert_eq!(coerce_number(" $2,500 "), 2500.0);
    }

    #[test]
    fn test_coerce_percent_cells() {
        assert_eq!(coerce_number("-12.3%"), -12.3);
        assert_eq!(coerce_number("7.25%"), 7.25);
    }

    #[test]
    fn test_coerce_junk_is_zero() {
        assert_eq!(coerce_number(""), 0.0);
        assert_eq!(coerce_number("n/a"), 0.0);
        assert_eq!(coerce_number("--5"), 0.0);
        assert_eq!(coerce_number("pending"), 0.0);
    }

    #[test]
    fn test_coerce_is_finite() {
        for cell in ["₹1,23,456.78", "-0.00", "%", ",", "-"] {
            assert!(coerce_number(cell).is_finite());
        }
    }

    #[test]
    fn test_from_csv_pads_short_rows() {
        let sheet = Sheet::from_csv("Stocks", "Name,Invested Total,P&L\nINFY,₹100\n").unwrap();
        assert_eq!(sheet.columns(), &["Name", "Invested Total", "P&L"]);
        assert_eq!(sheet.rows()[0], vec!["INFY", "₹100", ""]);
    }

    #[test]
    fn test_clean_drops_placeholder_columns() {
        let text = "Name,Unnamed: 2,,Invested Total\nINFY,x,y,₹100\n";
        let sheet = Sheet::from_csv("Stocks", text).unwrap();
        assert_eq!(sheet.columns(), &["Name", "Invested Total"]);
        assert_eq!(sheet.rows()[0], vec!["INFY", "₹100"]);
    }

    #[test]
    fn test_clean_drops_fully_empty_columns() {
        let text = "Name,Notes,Invested Total\nINFY,,₹100\nTCS,,₹200\n";
        let sheet = Sheet::from_csv("Stocks", text).unwrap();
        assert_eq!(sheet.columns(), &["Name", "Invested Total"]);
    }

    #[test]
    fn test_clean_keeps_named_columns_without_rows() {
        let sheet = Sheet::from_csv("Stocks", "Name,Invested Total\n").unwrap();
        assert_eq!(sheet.columns(), &["Name", "Invested Total"]);
        assert!(sheet.rows().is_empty());
    }

    #[test]
    fn test_empty_text_is_an_error() {
        assert!(Sheet::from_csv("Stocks", "   \n").is_err());
    }

    #[test]
    fn test_column_values() {
        let sheet = Sheet::from_csv("Stocks", "Name,P&L\nINFY,₹10\nTCS,-₹4\n").unwrap();
        assert_eq!(sheet.column_values("P&L"), Some(vec!["₹10", "-₹4"]));
        assert_eq!(sheet.column_values("Current Total"), None);
    }
}
