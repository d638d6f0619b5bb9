//! Shared fixtures for unit tests, integration tests and benches.

pub mod fixtures {
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::error::{AppError, Result};
    use crate::service::http::PageFetcher;

    /// One listing row, built up field by field.
    #[derive(Debug, Clone)]
    pub struct ListingRow {
        pub date: String,
        pub brand: String,
        pub description: String,
        pub product_type: String,
        pub reason: String,
        pub company: String,
        pub link: Option<String>,
        pub terminated: String,
    }

    impl ListingRow {
        pub fn new(date: &str, brand: &str) -> Self {
            Self {
                date: date.to_string(),
                brand: brand.to_string(),
                description: String::new(),
                product_type: "Food & Beverages".to_string(),
                reason: String::new(),
                company: String::new(),
                link: None,
                terminated: String::new(),
            }
        }

        pub fn description(mut self, v: &str) -> Self {
            self.description = v.to_string();
            self
        }

        pub fn product_type(mut self, v: &str) -> Self {
            self.product_type = v.to_string();
            self
        }

        pub fn reason(mut self, v: &str) -> Self {
            self.reason = v.to_string();
            self
        }

        pub fn company(mut self, v: &str) -> Self {
            self.company = v.to_string();
            self
        }

        pub fn link(mut self, v: &str) -> Self {
            self.link = Some(v.to_string());
            self
        }

        pub fn terminated(mut self, v: &str) -> Self {
            self.terminated = v.to_string();
            self
        }
    }

    /// Listing page shaped like the FDA recalls table.
    pub fn listing_html(rows: &[ListingRow]) -> String {
        let mut body = String::new();
        for row in rows {
            let brand = match &row.link {
                Some(href) => format!("<a href=\"{href}\">{}</a>", row.brand),
                None => row.brand.clone(),
            };
            body.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td></td></tr>\n",
                row.date,
                brand,
                row.description,
                row.product_type.replace('&', "&amp;"),
                row.reason,
                row.company,
                row.terminated
            ));
        }
        format!(
            r#"<!DOCTYPE html>
<html><body>
<table class="lcds-datatable table">
<thead><tr><th>Date</th><th>Brand Name(s)</th><th>Product Description</th><th>Product Type</th><th>Recall Reason Description</th><th>Company Name</th><th>Terminated Recall</th><th>Excerpt</th></tr></thead>
<tbody>
{body}</tbody>
</table>
</body></html>"#
        )
    }

    /// Detail page with one `<img srcset>` per photo group.
    pub fn detail_html(groups: &[&[(&str, u32)]]) -> String {
        let imgs: Vec<String> = groups
            .iter()
            .map(|variants| {
                let srcset = variants
                    .iter()
                    .map(|(url, width)| format!("{url} {width}w"))
                    .collect::<Vec<_>>()
                    .join(", ");
                let src = variants.first().map(|(url, _)| *url).unwrap_or_default();
                format!("<img src=\"{src}\" srcset=\"{srcset}\" alt=\"\">")
            })
            .collect();
        format!(
            "<html><body><h1>Recall</h1><img src=\"/logo.png\"><div class=\"lcds-gallery\">{}</div></body></html>",
            imgs.join("\n")
        )
    }

    /// In-memory `PageFetcher`: known URLs return their body, anything else fails.
    #[derive(Default)]
    pub struct StaticFetcher {
        pages: HashMap<String, Vec<u8>>,
        requests: Mutex<Vec<String>>,
    }

    impl StaticFetcher {
        pub fn page(self, url: &str, body: &str) -> Self {
            self.bytes(url, body.as_bytes())
        }

        pub fn bytes(mut self, url: &str, body: &[u8]) -> Self {
            self.pages.insert(url.to_string(), body.to_vec());
            self
        }

        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().map(|r| r.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(url.to_string());
            }
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| AppError::network(format!("{url}: HTTP 404 Not Found")))
        }
    }
}
