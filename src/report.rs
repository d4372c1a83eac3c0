use chrono::prelude::*;
use futures::future::join_all;
use piechart::{Chart, Color};
use tracing::debug;

use crate::client::SheetClient;
use crate::error::SheetError;
use crate::sheet::{coerce_number, Sheet};

/// One visible row of the Config sheet, resolved to a tab to render.
#[derive(Debug, Clone, PartialEq)]
pub struct TabPlan {
    pub sheet_name: String,
    pub display_name: String,
}

/// Visible sheets partitioned into the two top-level groups.
#[derive(Debug, Default, PartialEq)]
pub struct VisibleSheets {
    pub invested: Vec<TabPlan>,
    pub sold: Vec<TabPlan>,
}

/// Resolve the Config sheet into the tabs to display.
///
/// A row is visible iff its Show value, uppercased, equals "YES". Sheet
/// names containing "invested" go to the invested group; invested is
/// checked before "sold", so a name matching both lands in invested.
/// Names matching neither are dropped.
pub fn resolve_tabs(config: &Sheet) -> VisibleSheets {
    let mut visible = VisibleSheets::default();

    let names = config.column_values("Sheet Name").unwrap_or_default();
    let labels = config.column_values("Display Name").unwrap_or_default();
    let shows = config.column_values("Show").unwrap_or_default();

    for (i, &sheet_name) in names.iter().enumerate() {
        let show = shows.get(i).copied().unwrap_or("");
        if show.trim().to_uppercase() != "YES" {
            continue;
        }

        let display_name = labels
            .get(i)
            .copied()
            .filter(|label| !label.trim().is_empty())
            .unwrap_or(sheet_name)
            .trim()
            .to_string();

        let tab = TabPlan {
            sheet_name: sheet_name.trim().to_string(),
            display_name,
        };

        let lowered = sheet_name.to_lowercase();
        if lowered.contains("invested") {
            visible.invested.push(tab);
        } else if lowered.contains("sold") {
            visible.sold.push(tab);
        } else {
            debug!(sheet = sheet_name, "config row matches neither group, dropped");
        }
    }

    visible
}

/// Aggregate figures for one category sheet, recomputed on every build.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SectionSummary {
    pub invested: f64,
    pub current: f64,
    pub pnl: f64,
    pub return_pct: f64,
}

impl SectionSummary {
    /// Sum the three money columns of a sheet; a missing column sums to 0.
    pub fn from_sheet(sheet: &Sheet) -> SectionSummary {
        let invested = sum_column(sheet, "Invested Total");
        let current = sum_column(sheet, "Current Total");
        let pnl = sum_column(sheet, "P&L");
        let return_pct = if invested == 0.0 {
            0.0
        } else {
            pnl / invested * 100.0
        };

        SectionSummary {
            invested,
            current,
            pnl,
            return_pct,
        }
    }
}

fn sum_column(sheet: &Sheet, column: &str) -> f64 {
    sheet
        .column_values(column)
        .map(|values| values.iter().map(|v| coerce_number(v)).sum())
        .unwrap_or(0.0)
}

/// The Dashboard sheet's headline figures: four leading first-row cells
/// plus an optional "as of" stamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Headline {
    pub invested: f64,
    pub current: f64,
    pub pnl: f64,
    pub return_pct: f64,
    pub as_of: Option<String>,
}

impl Headline {
    pub fn from_sheet(sheet: &Sheet) -> Headline {
        let row = sheet.first_row().unwrap_or(&[]);
        let cell = |i: usize| row.get(i).map(|c| coerce_number(c)).unwrap_or(0.0);

        // The sheet revisions disagree on the header; accept both
        let as_of = ["Date Checked", "As of Date"]
            .iter()
            .find_map(|header| sheet.column_index(header))
            .and_then(|idx| row.get(idx))
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        Headline {
            invested: cell(0),
            current: cell(1),
            pnl: cell(2),
            return_pct: cell(3),
            as_of,
        }
    }
}

/// A fetched category sheet together with its derived summary.
#[derive(Debug, Clone)]
pub struct CategoryReport {
    pub display_name: String,
    pub sheet: Sheet,
    pub summary: SectionSummary,
}

/// Everything one render pass needs, assembled fresh from the source.
#[derive(Debug, Clone)]
pub struct Overview {
    pub headline: Headline,
    pub invested: Vec<CategoryReport>,
    pub sold: Vec<CategoryReport>,
    pub built_at: DateTime<Local>,
}

impl Overview {
    /// Fetch the Dashboard and Config sheets, then every visible category
    /// sheet, and derive all summaries. Any fetch failure aborts the build.
    pub async fn build(client: &SheetClient) -> Result<Overview, SheetError> {
        let dashboard = client.fetch_sheet("Dashboard").await?;
        let config = client.fetch_sheet("Config").await?;
        let tabs = resolve_tabs(&config);

        let invested = fetch_group(client, tabs.invested).await?;
        let sold = fetch_group(client, tabs.sold).await?;

        Ok(Overview {
            headline: Headline::from_sheet(&dashboard),
            invested,
            sold,
            built_at: Local::now(),
        })
    }

    /// Invested value share per category, in percent, descending.
    pub fn allocation(&self) -> Vec<(String, f64)> {
        let total: f64 = self.invested.iter().map(|c| c.summary.invested).sum();
        if total <= 0.0 {
            return Vec::new();
        }

        let mut shares: Vec<(String, f64)> = self
            .invested
            .iter()
            .map(|c| (c.display_name.clone(), c.summary.invested / total * 100.0))
            .collect();
        shares.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        shares
    }
}

async fn fetch_group(
    client: &SheetClient,
    tabs: Vec<TabPlan>,
) -> Result<Vec<CategoryReport>, SheetError> {
    let fetches = join_all(tabs.iter().map(|tab| client.fetch_sheet(&tab.sheet_name))).await;

    tabs.into_iter()
        .zip(fetches)
        .map(|(tab, fetched)| {
            fetched.map(|sheet| CategoryReport {
                display_name: tab.display_name,
                summary: SectionSummary::from_sheet(&sheet),
                sheet,
            })
        })
        .collect()
}

fn format_with_commas(value: f64) -> String {
    let formatted = format!("{value:.2}");
    let parts: Vec<&str> = formatted.split('.').collect();
    let integer_part = parts[0];
    let decimal_part = parts.get(1).unwrap_or(&"00");

    let formatted_integer = integer_part
        .chars()
        .rev()
        .collect::<String>()
        .chars()
        .collect::<Vec<_>>()
        .chunks(3)
        .map(|chunk| chunk.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(",")
        .chars()
        .rev()
        .collect::<String>();

    format!("{formatted_integer}.{decimal_part}")
}

fn format_money(value: f64, currency: &str) -> String {
    let number = format_with_commas(value);
    match currency {
        "INR" => format!("₹{number}"),
        "USD" => format!("${number}"),
        "EUR" => format!("{number} €"),
        "GBP" => format!("£{number}"),
        _ => format!("{number} {currency}"),
    }
}

/// Print the headline cards and one table per group.
pub fn print_summary(overview: &Overview, currency: &str) {
    use colored::Colorize;

    let headline = &overview.headline;
    let pnl_str = format_money(headline.pnl, currency);
    let pnl_colored = if headline.pnl >= 0.0 {
        pnl_str.green().bold()
    } else {
        pnl_str.red().bold()
    };
    let pct_str = format!("{:.2}%", headline.return_pct);
    let pct_colored = if headline.return_pct >= 0.0 {
        pct_str.green().bold()
    } else {
        pct_str.red().bold()
    };

    println!("{}", "Portfolio Summary".bold());
    println!(
        "Total Invested: {}",
        format_money(headline.invested, currency).bold()
    );
    println!(
        "Current Value:  {}",
        format_money(headline.current, currency).bold()
    );
    println!("P&L:            {pnl_colored}");
    println!("Return:         {pct_colored}");
    if let Some(as_of) = &headline.as_of {
        println!("{}", format!("As of {as_of}").dimmed());
    }

    print_group("Invested", &overview.invested);
    print_group("Sold", &overview.sold);
}

// Print one group as a table with a bold TOTAL row
fn print_group(title: &str, reports: &[CategoryReport]) {
    use comfy_table::{
        presets::UTF8_FULL, Attribute, Cell, CellAlignment, Color as TColor, ContentArrangement,
        Table,
    };

    if reports.is_empty() {
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);

    table.set_header(vec![
        Cell::new(title).add_attribute(Attribute::Bold),
        Cell::new("Invested").add_attribute(Attribute::Bold),
        Cell::new("Current").add_attribute(Attribute::Bold),
        Cell::new("P&L").add_attribute(Attribute::Bold),
        Cell::new("Return").add_attribute(Attribute::Bold),
    ]);

    let mut total = SectionSummary::default();
    for report in reports {
        let s = report.summary;
        total.invested += s.invested;
        total.current += s.current;
        total.pnl += s.pnl;

        let pnl_color = if s.pnl >= 0.0 {
            TColor::Green
        } else {
            TColor::Red
        };
        let pct_color = if s.return_pct >= 0.0 {
            TColor::Green
        } else {
            TColor::Red
        };

        table.add_row(vec![
            Cell::new(&report.display_name),
            Cell::new(format!("{:.2}", s.invested)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}", s.current)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}", s.pnl))
                .set_alignment(CellAlignment::Right)
                .fg(pnl_color),
            Cell::new(format!("{:.2}%", s.return_pct))
                .set_alignment(CellAlignment::Right)
                .fg(pct_color),
        ]);
    }

    total.return_pct = if total.invested == 0.0 {
        0.0
    } else {
        total.pnl / total.invested * 100.0
    };

    let total_pnl_color = if total.pnl >= 0.0 {
        TColor::Green
    } else {
        TColor::Red
    };
    let total_pct_color = if total.return_pct >= 0.0 {
        TColor::Green
    } else {
        TColor::Red
    };

    table.add_row(vec![
        Cell::new("TOTAL").add_attribute(Attribute::Bold),
        Cell::new(format!("{:.2}", total.invested))
            .set_alignment(CellAlignment::Right)
            .add_attribute(Attribute::Bold),
        Cell::new(format!("{:.2}", total.current))
            .set_alignment(CellAlignment::Right)
            .add_attribute(Attribute::Bold),
        Cell::new(format!("{:.2}", total.pnl))
            .set_alignment(CellAlignment::Right)
            .add_attribute(Attribute::Bold)
            .fg(total_pnl_color),
        Cell::new(format!("{:.2}%", total.return_pct))
            .set_alignment(CellAlignment::Right)
            .add_attribute(Attribute::Bold)
            .fg(total_pct_color),
    ]);

    println!("{table}");
}

/// Print a raw sheet as a table, coloring P&L-like columns by sign.
pub fn print_sheet(sheet: &Sheet) {
    use colored::Colorize;
    use comfy_table::{
        presets::UTF8_FULL, Attribute, Cell, CellAlignment, Color as TColor, ContentArrangement,
        Table,
    };

    println!("{}", sheet.name().bold());

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);

    table.set_header(
        sheet
            .columns()
            .iter()
            .map(|c| Cell::new(c).add_attribute(Attribute::Bold))
            .collect::<Vec<_>>(),
    );

    let signed_columns = ["P&L", "Percentage"];
    let numeric_columns = ["Invested Total", "Current Total", "P&L", "Percentage"];

    for row in sheet.rows() {
        let cells = sheet.columns().iter().zip(row).map(|(column, value)| {
            let mut cell = Cell::new(value);
            if numeric_columns.contains(&column.as_str()) {
                cell = cell.set_alignment(CellAlignment::Right);
            }
            if signed_columns.contains(&column.as_str()) {
                let color = if coerce_number(value) >= 0.0 {
                    TColor::Green
                } else {
                    TColor::Red
                };
                cell = cell.fg(color);
            }
            cell
        });
        table.add_row(cells.collect::<Vec<_>>());
    }

    println!("{table}");
}

pub fn draw_allocation_chart(overview: &Overview) {
    let shares = overview.allocation();
    if shares.is_empty() {
        println!("No invested categories to chart.");
        return;
    }

    let colors = [
        Color::Red,
        Color::Green,
        Color::Blue,
        Color::Yellow,
        Color::Cyan,
        Color::White,
        Color::Purple,
        Color::Black,
    ];

    let data: Vec<piechart::Data> = shares
        .iter()
        .enumerate()
        .map(|(i, (name, share))| piechart::Data {
            label: name.clone(),
            value: *share as f32,
            color: Some(colors[i % colors.len()].into()),
            fill: '•',
        })
        .collect();

    Chart::new()
        .legend(true)
        .radius(9)
        .aspect_ratio(3)
        .draw(&data);
}

// Print the allocation in descending order %-wise
pub fn print_allocation(overview: &Overview) {
    println!("====================================");
    for (category, share) in overview.allocation() {
        println!("{category: >24} | {share: >10.2}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(text: &str) -> Sheet {
        Sheet::from_csv("Test", text).unwrap()
    }

    #[test]
    fn test_section_sums_pnl_example() {
        let s = sheet("Name,P&L\na,₹100.00\nb,-₹40.00\nc,₹0\n");
        let summary = SectionSummary::from_sheet(&s);
        assert_eq!(summary.pnl, 60.0);
    }

    #[test]
    fn test_section_sums_all_columns() {
        let s = sheet(
            "Name,Invested Total,Current Total,P&L\n\
             a,\"₹1,000.00\",\"₹1,100.00\",₹100.00\n\
             b,₹500.00,₹450.00,-₹50.00\n",
        );
        let summary = SectionSummary::from_sheet(&s);
        assert_eq!(summary.invested, 1500.0);
        assert_eq!(summary.current, 1550.0);
        assert_eq!(summary.pnl, 50.0);
        assert!((summary.return_pct - 50.0 / 1500.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_section_is_order_independent() {
        let forward = sheet("Name,P&L\na,₹10\nb,₹20\nc,-₹5\n");
        let backward = sheet("Name,P&L\nc,-₹5\nb,₹20\na,₹10\n");
        assert_eq!(
            SectionSummary::from_sheet(&forward),
            SectionSummary::from_sheet(&backward)
        );
    }

    #[test]
    fn test_section_missing_columns_are_zero() {
        let s = sheet("Name,Qty\na,3\n");
        let summary = SectionSummary::from_sheet(&s);
        assert_eq!(summary, SectionSummary::default());
    }

    #[test]
    fn test_return_pct_zero_when_nothing_invested() {
        let s = sheet("Name,P&L\na,₹100\n");
        assert_eq!(SectionSummary::from_sheet(&s).return_pct, 0.0);
    }

    fn config_sheet() -> Sheet {
        sheet(
            "Sheet Name,Display Name,Show\n\
             Stocks Invested,Stocks,YES\n\
             Stocks Sold,Stocks (Sold),yes\n\
             Index Mutual Funds Invested,Mutual Funds,Yes\n\
             Fixed Deposits Invested,FDs,NO\n\
             Cash,Cash,YES\n",
        )
    }

    #[test]
    fn test_resolve_tabs_show_filter_is_case_insensitive() {
        let tabs = resolve_tabs(&config_sheet());
        assert_eq!(tabs.invested.len(), 2);
        assert_eq!(tabs.sold.len(), 1);
        assert_eq!(tabs.sold[0].sheet_name, "Stocks Sold");
        assert_eq!(tabs.sold[0].display_name, "Stocks (Sold)");
    }

    #[test]
    fn test_resolve_tabs_drops_hidden_and_unclassified_rows() {
        let tabs = resolve_tabs(&config_sheet());
        let all_names: Vec<&str> = tabs
            .invested
            .iter()
            .chain(&tabs.sold)
            .map(|t| t.sheet_name.as_str())
            .collect();
        // "NO" row and the "Cash" row matching neither group are gone
        assert!(!all_names.contains(&"Fixed Deposits Invested"));
        assert!(!all_names.contains(&"Cash"));
    }

    #[test]
    fn test_resolve_tabs_invested_wins_over_sold() {
        let s = sheet("Sheet Name,Display Name,Show\nInvested and Sold,Both,YES\n");
        let tabs = resolve_tabs(&s);
        assert_eq!(tabs.invested.len(), 1);
        assert!(tabs.sold.is_empty());
    }

    #[test]
    fn test_resolve_tabs_display_name_falls_back_to_sheet_name() {
        let s = sheet("Sheet Name,Display Name,Show\nGold Invested,,YES\n");
        let tabs = resolve_tabs(&s);
        assert_eq!(tabs.invested[0].display_name, "Gold Invested");
    }

    #[test]
    fn test_headline_reads_leading_cells() {
        let s = sheet(
            "Invested,Current,P&L,Return,Date Checked\n\
             \"₹10,000.00\",\"₹11,000.00\",\"₹1,000.00\",10.00%,2024-05-01\n",
        );
        let headline = Headline::from_sheet(&s);
        assert_eq!(headline.invested, 10000.0);
        assert_eq!(headline.current, 11000.0);
        assert_eq!(headline.pnl, 1000.0);
        assert_eq!(headline.return_pct, 10.0);
        assert_eq!(headline.as_of.as_deref(), Some("2024-05-01"));
    }

    #[test]
    fn test_headline_accepts_as_of_date_header() {
        let s = sheet("A,B,C,D,As of Date\n1,2,3,4,2024-06-15\n");
        assert_eq!(
            Headline::from_sheet(&s).as_of.as_deref(),
            Some("2024-06-15")
        );
    }

    #[test]
    fn test_headline_empty_sheet_is_zeroed() {
        let s = sheet("A,B,C,D\n");
        assert_eq!(Headline::from_sheet(&s), Headline::default());
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(1234.5, "INR"), "₹1,234.50");
        assert_eq!(format_money(-40.0, "USD"), "$-40.00");
        assert_eq!(format_money(99.9, "CHF"), "99.90 CHF");
    }
}
