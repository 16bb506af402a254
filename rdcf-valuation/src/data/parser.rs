//! Screener company page parsing.
//!
//! Every figure is located by its visible label ("Stock P/E", "Net Profit",
//! "ROCE %", ...), never by position on the page. A label that is present
//! with a blank value yields `None`; a value that is present but not a number
//! is a `ProviderError::Parse`.

use chrono::Utc;
use scraper::{ElementRef, Html, Selector};

use super::provider::ProviderError;
use super::{GrowthPeriod, MarketSnapshot, StatementBasis};

/// Number of most recent yearly RoCE values the median is taken over.
const ROCE_MEDIAN_YEARS: usize = 5;

const SALES_GROWTH_TITLE: &str = "Compounded Sales Growth";
const PROFIT_GROWTH_TITLE: &str = "Compounded Profit Growth";

// ============================================================================
// Parsed Page
// ============================================================================

/// A value from one fiscal-year column.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnualFigure {
    /// Column header, e.g. "Mar 2024"
    pub period: String,
    pub value: f64,
}

/// Figures read from one company page, before any requirement is enforced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompanyPage {
    pub company_name: Option<String>,
    pub exchange_symbol: Option<String>,
    pub current_pe: Option<f64>,
    pub market_cap: Option<f64>,
    /// Net profit of the last full fiscal year (TTM column excluded)
    pub annual_net_profit: Option<AnnualFigure>,
    /// "ROCE %" row, oldest first, blank years skipped
    pub roce_history: Vec<f64>,
    pub sales_growth: Vec<GrowthPeriod>,
    pub profit_growth: Vec<GrowthPeriod>,
}

impl CompanyPage {
    /// Market cap over the latest full-year net profit, rounded to one decimal.
    pub fn forward_pe(&self) -> Result<f64, ProviderError> {
        let market_cap = self
            .market_cap
            .ok_or_else(|| ProviderError::missing("Market Cap"))?;
        let profit = self
            .annual_net_profit
            .as_ref()
            .ok_or_else(|| ProviderError::missing("Net Profit"))?;

        if profit.value == 0.0 {
            return Err(ProviderError::Parse(format!(
                "Net Profit for {} is zero",
                profit.period
            )));
        }

        Ok(round_to_tenth(market_cap / profit.value))
    }

    /// Median of the last five yearly RoCE values.
    pub fn historical_roce(&self) -> Result<f64, ProviderError> {
        let start = self.roce_history.len().saturating_sub(ROCE_MEDIAN_YEARS);
        median(&self.roce_history[start..]).ok_or_else(|| ProviderError::missing("ROCE %"))
    }

    /// Enforce the required fields and build a snapshot.
    pub fn into_snapshot(
        self,
        symbol: &str,
        basis: StatementBasis,
    ) -> Result<MarketSnapshot, ProviderError> {
        let current_pe = self
            .current_pe
            .ok_or_else(|| ProviderError::missing("Stock P/E"))?;
        let forward_pe = self.forward_pe()?;
        let historical_roce = self.historical_roce()?;

        let market_cap = self
            .market_cap
            .ok_or_else(|| ProviderError::missing("Market Cap"))?;
        let profit = self
            .annual_net_profit
            .ok_or_else(|| ProviderError::missing("Net Profit"))?;

        Ok(MarketSnapshot {
            symbol: symbol.to_string(),
            company_name: self.company_name,
            exchange_symbol: self.exchange_symbol,
            basis,
            current_pe,
            forward_pe,
            market_cap,
            latest_annual_net_profit: profit.value,
            latest_fiscal_year: profit.period,
            historical_roce,
            roce_history: self.roce_history,
            sales_growth: self.sales_growth,
            profit_growth: self.profit_growth,
            fetched_at: Utc::now(),
        })
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse a Screener company page.
///
/// Fails with `Parse` only when the page is not a company page at all (no
/// `#top-ratios` list) or when a labelled value is not a number.
pub fn parse_company_page(html: &str) -> Result<CompanyPage, ProviderError> {
    let document = Html::parse_document(html);

    let ratio_item = selector("#top-ratios li")?;
    let items: Vec<ElementRef<'_>> = document.select(&ratio_item).collect();
    if items.is_empty() {
        return Err(ProviderError::Parse("top ratios list not found".into()));
    }

    let mut page = CompanyPage::default();

    let name = selector(".name")?;
    let number = selector(".number")?;
    for item in items {
        let Some(label) = item.select(&name).next().map(cell_text) else {
            continue;
        };
        let value = item.select(&number).next().map(cell_text).unwrap_or_default();

        match label.as_str() {
            "Stock P/E" => page.current_pe = parse_number(&value, "Stock P/E")?,
            "Market Cap" => page.market_cap = parse_number(&value, "Market Cap")?,
            _ => {}
        }
    }

    page.company_name = document
        .select(&selector("h1")?)
        .next()
        .map(cell_text)
        .filter(|text| !text.is_empty());
    page.exchange_symbol = exchange_symbol(&document)?;

    if let Some(table) = DataTable::find(&document, "#profit-loss table.data-table")? {
        page.annual_net_profit = table.latest_annual("Net Profit")?;
    }

    if let Some(table) = DataTable::find(&document, "#ratios table.data-table")? {
        if let Some(cells) = table.row("ROCE %") {
            for cell in cells {
                if let Some(value) = parse_number(cell, "ROCE %")? {
                    page.roce_history.push(value);
                }
            }
        }
    }

    let ranges = selector("table.ranges-table")?;
    for table in document.select(&ranges) {
        let (title, periods) = read_ranges_table(table)?;
        match title.as_str() {
            SALES_GROWTH_TITLE => page.sales_growth = periods,
            PROFIT_GROWTH_TITLE => page.profit_growth = periods,
            _ => {}
        }
    }

    Ok(page)
}

/// Listing code from the company links, NSE preferred over BSE.
fn exchange_symbol(document: &Html) -> Result<Option<String>, ProviderError> {
    let spans = selector(".company-links span")?;

    let listings: Vec<(String, String)> = document
        .select(&spans)
        .map(cell_text)
        .filter_map(|text| {
            let (exchange, code) = text.split_once(':')?;
            let code = code.trim();
            (!code.is_empty()).then(|| (exchange.trim().to_uppercase(), code.to_string()))
        })
        .collect();

    Ok(["NSE", "BSE"].iter().find_map(|exchange| {
        listings
            .iter()
            .find(|(listed, _)| listed == exchange)
            .map(|(_, code)| code.clone())
    }))
}

fn read_ranges_table(table: ElementRef<'_>) -> Result<(String, Vec<GrowthPeriod>), ProviderError> {
    let th = selector("th")?;
    let tr = selector("tr")?;
    let td = selector("td")?;

    let title = table.select(&th).next().map(cell_text).unwrap_or_default();

    let mut periods = Vec::new();
    for row in table.select(&tr) {
        let cells: Vec<String> = row.select(&td).map(cell_text).collect();
        if cells.len() < 2 {
            continue;
        }
        periods.push(GrowthPeriod {
            label: cells[0].trim_end_matches(':').trim().to_string(),
            percent: parse_number(&cells[1], &title)?,
        });
    }

    Ok((title, periods))
}

// ============================================================================
// Data Tables
// ============================================================================

/// A year-by-column table: one header row, then one labelled row per metric.
struct DataTable {
    /// Column headers, excluding the label column
    headers: Vec<String>,
    rows: Vec<(String, Vec<String>)>,
}

impl DataTable {
    fn find(document: &Html, css: &str) -> Result<Option<Self>, ProviderError> {
        match document.select(&selector(css)?).next() {
            Some(table) => Self::read(table).map(Some),
            None => Ok(None),
        }
    }

    fn read(table: ElementRef<'_>) -> Result<Self, ProviderError> {
        let tr = selector("tr")?;
        let th = selector("th")?;
        let td = selector("td")?;

        let mut headers = Vec::new();
        let mut rows = Vec::new();

        for row in table.select(&tr) {
            let mut cells = row.select(&td).map(cell_text);
            match cells.next() {
                Some(label) => rows.push((label, cells.collect())),
                None if headers.is_empty() => {
                    headers = row.select(&th).map(cell_text).skip(1).collect();
                }
                None => {}
            }
        }

        Ok(Self { headers, rows })
    }

    fn row(&self, label: &str) -> Option<&[String]> {
        self.rows
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, cells)| cells.as_slice())
    }

    /// Value of the last fiscal-year column of a row, skipping TTM.
    fn latest_annual(&self, label: &str) -> Result<Option<AnnualFigure>, ProviderError> {
        let Some(cells) = self.row(label) else {
            return Ok(None);
        };
        let Some(index) = self
            .headers
            .iter()
            .rposition(|header| !header.is_empty() && !header.eq_ignore_ascii_case("TTM"))
        else {
            return Ok(None);
        };

        let value = match cells.get(index) {
            Some(cell) => parse_number(cell, label)?,
            None => None,
        };

        Ok(value.map(|value| AnnualFigure {
            period: self.headers[index].clone(),
            value,
        }))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn selector(css: &str) -> Result<Selector, ProviderError> {
    Selector::parse(css)
        .map_err(|e| ProviderError::Parse(format!("Invalid CSS selector {}: {:?}", css, e)))
}

/// Visible text of an element with whitespace collapsed and the expand
/// marker ("+") of collapsible rows removed.
fn cell_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches('+')
        .trim_end()
        .to_string()
}

/// Parse a displayed number such as "2,39,776", "72.4" or "135%".
///
/// Blank cells (and a lone "-") are `None`.
fn parse_number(text: &str, field: &str) -> Result<Option<f64>, ProviderError> {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, ',' | '%' | '\u{20b9}') && !c.is_whitespace())
        .collect();
    let cleaned = cleaned.trim_end_matches("Cr.");

    if cleaned.is_empty() || cleaned == "-" {
        return Ok(None);
    }

    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(ProviderError::Parse(format!(
            "{}: {:?} is not a number",
            field, text
        ))),
    }
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}
