//! Catalog query parameters and the local consistency pass.

use agent_market_core::{Category, PriceRange, SortKey};
use tracing::debug;

use crate::models::Agent;

/// Category, price bounds and sort order sent with every listing request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogQuery {
    pub category: Category,
    pub price_range: PriceRange,
    pub sort: SortKey,
}

impl CatalogQuery {
    /// Query-string pairs for `GET /agents`. `category` is omitted for `All`.
    #[must_use]
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(4);
        if self.category != Category::All {
            params.push(("category", self.category.as_str().to_string()));
        }
        params.push(("min_price", self.price_range.min().amount().to_string()));
        params.push(("max_price", self.price_range.max().amount().to_string()));
        params.push(("sort_by", self.sort.as_str().to_string()));
        params
    }

    /// Whether `agent` satisfies the category and price bounds.
    #[must_use]
    pub fn admits(&self, agent: &Agent) -> bool {
        agent.in_category(self.category) && self.price_range.contains(agent.price)
    }

    /// Keep only agents this query admits, preserving server order.
    ///
    /// The server is expected to have filtered already, so this is normally
    /// a no-op. Anything it drops is logged.
    #[must_use]
    pub fn retain_matching(&self, mut agents: Vec<Agent>) -> Vec<Agent> {
        let before = agents.len();
        agents.retain(|agent| self.admits(agent));
        let dropped = before - agents.len();
        if dropped > 0 {
            debug!(
                dropped,
                category = %self.category,
                "Server listing included agents outside the query"
            );
        }
        agents
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use agent_market_core::{AgentId, Price};

    use crate::store::cart::tests::agent;

    fn in_category(id: i64, dollars: i64, category: &str) -> Agent {
        let mut a = agent(id, dollars * 100);
        a.category = category.to_string();
        a
    }

    #[test]
    fn test_params_omit_all_category() {
        let params = CatalogQuery::default().to_params();
        assert_eq!(
            params,
            vec![
                ("min_price", "0".to_string()),
                ("max_price", "500".to_string()),
                ("sort_by", "popular".to_string()),
            ]
        );
    }

    #[test]
    fn test_params_include_category_and_bounds() {
        let query = CatalogQuery {
            category: Category::DataAnalysis,
            price_range: PriceRange::new(Price::from_dollars(10), Price::from_cents(9950)).unwrap(),
            sort: SortKey::PriceLow,
        };
        let params = query.to_params();
        assert_eq!(params[0], ("category", "Data Analysis".to_string()));
        assert_eq!(params[1], ("min_price", "10".to_string()));
        assert_eq!(params[2], ("max_price", "99.50".to_string()));
        assert_eq!(params[3], ("sort_by", "price-low".to_string()));
    }

    #[test]
    fn test_retain_drops_only_mismatches() {
        let query = CatalogQuery {
            category: Category::Sales,
            price_range: PriceRange::new(Price::from_dollars(10), Price::from_dollars(50)).unwrap(),
            sort: SortKey::Newest,
        };
        let agents = vec![
            in_category(1, 10, "Sales"),
            in_category(2, 50, "sales"),
            in_category(3, 51, "Sales"),
            in_category(4, 20, "Marketing"),
            in_category(5, 9, "Sales"),
        ];

        let kept: Vec<AgentId> = query
            .retain_matching(agents)
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(kept, vec![AgentId::new(1), AgentId::new(2)]);
    }

    #[test]
    fn test_retain_is_noop_when_consistent() {
        let query = CatalogQuery::default();
        let agents = vec![in_category(1, 5, "Research"), in_category(2, 500, "Gardening")];
        assert_eq!(query.retain_matching(agents.clone()), agents);
    }
}
