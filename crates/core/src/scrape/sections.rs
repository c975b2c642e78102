use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde::Serialize;

pub const NOT_FOUND_MARKER: &str = "Page Not Found";

static HEADING: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h2").expect("failed to parse heading selector"));

/// The seven disclosure regions of a company page, in prompt order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    CompanyInfo,
    DayChange,
    Analysis,
    Quarters,
    ProfitLoss,
    BalanceSheet,
    CashFlow,
}

impl SectionKind {
    pub const ALL: [SectionKind; 7] = [
        SectionKind::CompanyInfo,
        SectionKind::DayChange,
        SectionKind::Analysis,
        SectionKind::Quarters,
        SectionKind::ProfitLoss,
        SectionKind::BalanceSheet,
        SectionKind::CashFlow,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SectionKind::CompanyInfo => "Company Info",
            SectionKind::DayChange => "Percentage Change in a Day",
            SectionKind::Analysis => "Analysis",
            SectionKind::Quarters => "Quarters",
            SectionKind::ProfitLoss => "Profit Loss",
            SectionKind::BalanceSheet => "Balance Sheet",
            SectionKind::CashFlow => "Cash Flow",
        }
    }

    fn css(self) -> &'static str {
        match self {
            SectionKind::CompanyInfo => ".company-info",
            // The day-change badge is tagged `down` or `up` depending on direction.
            SectionKind::DayChange => {
                ".font-size-12.down.margin-left-4, .font-size-12.up.margin-left-4"
            }
            SectionKind::Analysis => "#analysis",
            SectionKind::Quarters => "#quarters",
            SectionKind::ProfitLoss => "#profit-loss",
            SectionKind::BalanceSheet => "#balance-sheet",
            SectionKind::CashFlow => "#cash-flow",
        }
    }
}

static SECTION_SELECTORS: Lazy<Vec<(SectionKind, Selector)>> = Lazy::new(|| {
    SectionKind::ALL
        .iter()
        .map(|kind| {
            let selector = Selector::parse(kind.css()).expect("failed to parse section selector");
            (*kind, selector)
        })
        .collect()
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawSections {
    pub company_info: String,
    pub day_change: String,
    pub analysis: String,
    pub quarters: String,
    pub profit_loss: String,
    pub balance_sheet: String,
    pub cash_flow: String,
}

impl RawSections {
    pub fn get(&self, kind: SectionKind) -> &str {
        match kind {
            SectionKind::CompanyInfo => &self.company_info,
            SectionKind::DayChange => &self.day_change,
            SectionKind::Analysis => &self.analysis,
            SectionKind::Quarters => &self.quarters,
            SectionKind::ProfitLoss => &self.profit_loss,
            SectionKind::BalanceSheet => &self.balance_sheet,
            SectionKind::CashFlow => &self.cash_flow,
        }
    }

    fn slot(&mut self, kind: SectionKind) -> &mut String {
        match kind {
            SectionKind::CompanyInfo => &mut self.company_info,
            SectionKind::DayChange => &mut self.day_change,
            SectionKind::Analysis => &mut self.analysis,
            SectionKind::Quarters => &mut self.quarters,
            SectionKind::ProfitLoss => &mut self.profit_loss,
            SectionKind::BalanceSheet => &mut self.balance_sheet,
            SectionKind::CashFlow => &mut self.cash_flow,
        }
    }

    /// Sections paired with their labels, in the fixed prompt order.
    pub fn labeled(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        SectionKind::ALL
            .into_iter()
            .map(move |kind| (kind.label(), self.get(kind)))
    }

    pub fn is_empty(&self) -> bool {
        SectionKind::ALL.iter().all(|kind| self.get(*kind).is_empty())
    }

    pub fn total_len(&self) -> usize {
        SectionKind::ALL.iter().map(|kind| self.get(*kind).len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageContent {
    NotFound,
    Sections(RawSections),
}

/// Pulls the full text of every section anchor. Tables are not interpreted.
pub fn extract_sections(html: &str) -> PageContent {
    let document = Html::parse_document(html);

    let not_found = document
        .select(&HEADING)
        .any(|h| h.text().collect::<String>().contains(NOT_FOUND_MARKER));
    if not_found {
        return PageContent::NotFound;
    }

    let mut sections = RawSections::default();
    for (kind, selector) in SECTION_SELECTORS.iter() {
        let text: String = document.select(selector).flat_map(|el| el.text()).collect();
        *sections.slot(*kind) = squeeze_lines(&text);
    }
    PageContent::Sections(sections)
}

fn squeeze_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<html><body>
  <div class="company-info">
    <h1>Abcd Industries Ltd</h1>
    <div>Current Price <span>₹ 1,234.50</span></div>
  </div>
  <span class="font-size-12 down margin-left-4">-0.98%</span>
  <section id="analysis"><ul><li>Company has low debt.</li></ul></section>
  <section id="quarters"><table><tr><td>Sales</td><td>1,200</td></tr></table></section>
  <section id="profit-loss"><p>Net Profit 300</p></section>
  <section id="balance-sheet"><p>Borrowings 10</p></section>
  <section id="cash-flow"><p>CFO 280</p></section>
</body></html>
"#;

    #[test]
    fn extracts_all_sections_as_text() {
        let PageContent::Sections(s) = extract_sections(PAGE) else {
            panic!("expected sections");
        };
        assert_eq!(s.company_info, "Abcd Industries Ltd\nCurrent Price ₹ 1,234.50");
        assert_eq!(s.day_change, "-0.98%");
        assert_eq!(s.analysis, "Company has low debt.");
        assert_eq!(s.quarters, "Sales1,200");
        assert_eq!(s.profit_loss, "Net Profit 300");
        assert_eq!(s.balance_sheet, "Borrowings 10");
        assert_eq!(s.cash_flow, "CFO 280");
    }

    #[test]
    fn day_change_matches_upward_badge() {
        let html = r#"<div class="company-info">X</div><span class="font-size-12 up margin-left-4">1.5%</span>"#;
        let PageContent::Sections(s) = extract_sections(html) else {
            panic!("expected sections");
        };
        assert_eq!(s.day_change, "1.5%");
    }

    #[test]
    fn detects_not_found_heading() {
        let html = "<html><body><h2>Error 404: Page Not Found</h2></body></html>";
        assert_eq!(extract_sections(html), PageContent::NotFound);
    }

    #[test]
    fn missing_anchors_yield_empty_sections() {
        let PageContent::Sections(s) = extract_sections("<html><body><p>hi</p></body></html>") else {
            panic!("expected sections");
        };
        assert!(s.is_empty());
        assert_eq!(s.total_len(), 0);
    }

    #[test]
    fn labeled_order_is_fixed() {
        let labels: Vec<_> = RawSections::default().labeled().map(|(l, _)| l).collect();
        assert_eq!(
            labels,
            vec![
                "Company Info",
                "Percentage Change in a Day",
                "Analysis",
                "Quarters",
                "Profit Loss",
                "Balance Sheet",
                "Cash Flow"
            ]
        );
    }
}
