//! Listing page extraction.
//!
//! The listing is a single HTML table. The first row is the header; every
//! other row maps positionally onto a `RecallRecord`:
//! date, brand (with detail link), description, type, reason, company,
//! terminated. Extra trailing columns are ignored.

use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use url::Url;

use crate::domain::models::RecallRecord;
use crate::error::{AppError, Result, RowError};

pub const MIN_COLUMNS: usize = 7;

pub struct ListingDocument {
    html: Html,
}

/// Everything the listing produced, with malformed rows split out.
#[derive(Debug, Default)]
pub struct ListingExtraction {
    pub records: Vec<RecallRecord>,
    pub skipped: Vec<RowError>,
}

impl ListingExtraction {
    pub fn rows_seen(&self) -> usize {
        self.records.len() + self.skipped.len()
    }
}

impl ListingDocument {
    pub fn parse(markup: &str) -> Self {
        Self {
            html: Html::parse_document(markup),
        }
    }

    fn table(&self, table_selector: &str) -> Result<ElementRef<'_>> {
        let selector = Selector::parse(table_selector)
            .map_err(|e| AppError::config(format!("invalid selector {table_selector:?}: {e}")))?;
        self.html
            .select(&selector)
            .next()
            .ok_or_else(|| AppError::TableNotFound {
                selector: table_selector.to_string(),
            })
    }

    /// Lazily maps the data rows of the listing table.
    ///
    /// Fails only when the table itself is missing; short rows come back as
    /// `Err(RowError)` items so the caller can skip them and keep going.
    pub fn rows<'a>(
        &'a self,
        table_selector: &str,
        base_url: &'a Url,
    ) -> Result<impl Iterator<Item = std::result::Result<RecallRecord, RowError>> + 'a> {
        static TR: OnceLock<Selector> = OnceLock::new();
        let tr = TR.get_or_init(|| Selector::parse("tr").unwrap());

        let table = self.table(table_selector)?;
        Ok(table
            .select(tr)
            .skip(1)
            .enumerate()
            .map(move |(idx, row)| map_row(row, idx + 1, base_url)))
    }

    /// Drains `rows` into records and skipped rows, logging each skip.
    pub fn extract(&self, table_selector: &str, base_url: &Url) -> Result<ListingExtraction> {
        let mut extraction = ListingExtraction::default();
        for row in self.rows(table_selector, base_url)? {
            match row {
                Ok(record) => extraction.records.push(record),
                Err(e) => {
                    tracing::warn!("[LISTING] Skipping malformed row: {}", e);
                    extraction.skipped.push(e);
                }
            }
        }
        tracing::info!(
            "[LISTING] Extracted {} records ({} rows skipped)",
            extraction.records.len(),
            extraction.skipped.len()
        );
        Ok(extraction)
    }
}

fn map_row(
    row: ElementRef<'_>,
    row_number: usize,
    base_url: &Url,
) -> std::result::Result<RecallRecord, RowError> {
    let cells: Vec<ElementRef<'_>> = row
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "td")
        .collect();

    if cells.len() < MIN_COLUMNS {
        return Err(RowError::TooFewColumns {
            row: row_number,
            found: cells.len(),
            expected: MIN_COLUMNS,
        });
    }

    Ok(RecallRecord {
        date: cell_text(cells[0]),
        brand_name: cell_text(cells[1]),
        product_description: cell_text(cells[2]),
        product_type: cell_text(cells[3]),
        recall_reason: cell_text(cells[4]),
        company_name: cell_text(cells[5]),
        detail_page_url: detail_link(cells[1], base_url).unwrap_or_default(),
        terminated: cell_text(cells[6]),
        image_filenames: Vec::new(),
        caption: None,
    })
}

/// Visible text of a cell with whitespace runs collapsed.
pub fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// First hyperlink inside `cell`, resolved against the site base.
pub fn detail_link(cell: ElementRef<'_>, base_url: &Url) -> Option<String> {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    let selector = SELECTOR.get_or_init(|| Selector::parse("a[href]").unwrap());

    let href = cell.select(selector).next()?.value().attr("href")?.trim();
    if href.is_empty() {
        return None;
    }
    match base_url.join(href) {
        Ok(url) => Some(url.to_string()),
        Err(e) => {
            tracing::debug!("[LISTING] Unresolvable link {:?}: {}", href, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures::{listing_html, ListingRow};

    fn base() -> Url {
        Url::parse("https://www.fda.gov").unwrap()
    }

    #[test]
    fn test_maps_columns_positionally() {
        let html = listing_html(&[ListingRow::new("03/01/2024", "Fresh Direct")
            .description("Dark Chocolate Covered Pretzels")
            .product_type("Food & Beverages")
            .reason("Undeclared milk")
            .company("Acme Co")
            .link("/recalls/fresh-direct")]);

        let doc = ListingDocument::parse(&html);
        let extraction = doc.extract("table.lcds-datatable", &base()).unwrap();

        assert_eq!(extraction.records.len(), 1);
        let record = &extraction.records[0];
        assert_eq!(record.date, "03/01/2024");
        assert_eq!(record.brand_name, "Fresh Direct");
        assert_eq!(record.product_description, "Dark Chocolate Covered Pretzels");
        assert_eq!(record.product_type, "Food & Beverages");
        assert_eq!(record.recall_reason, "Undeclared milk");
        assert_eq!(record.company_name, "Acme Co");
        assert_eq!(
            record.detail_page_url,
            "https://www.fda.gov/recalls/fresh-direct"
        );
        assert!(record.image_filenames.is_empty());
        assert!(record.caption.is_none());
    }

    #[test]
    fn test_missing_table_is_fatal() {
        let doc = ListingDocument::parse("<html><body><table class='other'></table></body></html>");
        let err = doc.extract("table.lcds-datatable", &base()).unwrap_err();
        assert!(matches!(err, AppError::TableNotFound { .. }));
    }

    #[test]
    fn test_short_rows_are_skipped() {
        let html = r#"
            <table class="lcds-datatable">
                <thead><tr><th>Date</th><th>Brand</th></tr></thead>
                <tbody>
                    <tr><td>01/01/2024</td><td>Only</td><td>Three</td></tr>
                    <tr><td>01/02/2024</td><td>Brand</td><td>Desc</td><td>Food</td><td>Reason</td><td>Co</td><td></td></tr>
                    <tr></tr>
                </tbody>
            </table>"#;
        let doc = ListingDocument::parse(html);
        let extraction = doc.extract("table.lcds-datatable", &base()).unwrap();

        assert_eq!(extraction.records.len(), 1);
        assert_eq!(extraction.records[0].date, "01/02/2024");
        assert_eq!(extraction.skipped.len(), 2);
        assert_eq!(
            extraction.skipped[0],
            RowError::TooFewColumns {
                row: 1,
                found: 3,
                expected: 7
            }
        );
        assert_eq!(extraction.rows_seen(), 3);
    }

    #[test]
    fn test_header_row_is_skipped_even_with_td_cells() {
        let html = r#"
            <table class="lcds-datatable">
                <tr><td>Date</td><td>Brand</td><td>Desc</td><td>Type</td><td>Reason</td><td>Company</td><td>Terminated</td></tr>
                <tr><td>05/05/2024</td><td>B</td><td>D</td><td>T</td><td>R</td><td>C</td><td>Yes</td></tr>
            </table>"#;
        let doc = ListingDocument::parse(html);
        let extraction = doc.extract("table.lcds-datatable", &base()).unwrap();
        assert_eq!(extraction.records.len(), 1);
        assert_eq!(extraction.records[0].date, "05/05/2024");
        assert_eq!(extraction.records[0].terminated, "Yes");
    }

    #[test]
    fn test_no_link_gives_empty_detail_url() {
        let html = listing_html(&[ListingRow::new("03/02/2024", "Plain Brand")]);
        let doc = ListingDocument::parse(&html);
        let extraction = doc.extract("table.lcds-datatable", &base()).unwrap();
        assert_eq!(extraction.records[0].detail_page_url, "");
        assert!(!extraction.records[0].has_detail_page());
    }

    #[test]
    fn test_absolute_link_kept_and_whitespace_collapsed() {
        let html = r#"
            <table class="lcds-datatable">
                <tr><th>h</th></tr>
                <tr>
                    <td> 03/03/2024 </td>
                    <td><a href="https://other.example/recall">  Big
                        Brand </a><a href="/second">ignored</a></td>
                    <td>Desc</td><td>Food</td><td>Reason</td><td>Co</td><td></td><td>excerpt</td>
                </tr>
            </table>"#;
        let doc = ListingDocument::parse(html);
        let extraction = doc.extract("table.lcds-datatable", &base()).unwrap();
        let record = &extraction.records[0];
        assert_eq!(record.date, "03/03/2024");
        assert_eq!(record.brand_name, "Big Brand ignored");
        assert_eq!(record.detail_page_url, "https://other.example/recall");
    }

    #[test]
    fn test_rows_iterator_is_lazy() {
        let rows: Vec<ListingRow> = (0..50)
            .map(|i| ListingRow::new(&format!("01/{:02}/2024", i % 28 + 1), &format!("Brand {i}")))
            .collect();
        let html = listing_html(&rows);
        let doc = ListingDocument::parse(&html);
        let base = base();
        let first_two: Vec<_> = doc
            .rows("table.lcds-datatable", &base)
            .unwrap()
            .take(2)
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert_eq!(first_two.len(), 2);
        assert_eq!(first_two[1].brand_name, "Brand 1");
    }
}
