//! Shopping cart held in client memory.

use agent_market_core::{AgentId, Price};

use crate::models::Agent;

/// One cart line: an agent and how many licences of it.
#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    pub agent: Agent,
    pub quantity: u32,
}

impl CartLine {
    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.agent.price * self.quantity
    }
}

/// Ordered list of cart lines, at most one per agent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Lines in the order they were first added.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Quantity held for `id`, zero when absent.
    #[must_use]
    pub fn quantity_of(&self, id: AgentId) -> u32 {
        self.lines
            .iter()
            .find(|line| line.agent.id == id)
            .map_or(0, |line| line.quantity)
    }

    /// Add one of `agent`. An existing line is incremented, otherwise a new
    /// line is appended with quantity 1.
    pub fn add(&mut self, agent: Agent) {
        if let Some(line) = self.lines.iter_mut().find(|l| l.agent.id == agent.id) {
            line.quantity = line.quantity.saturating_add(1);
        } else {
            self.lines.push(CartLine { agent, quantity: 1 });
        }
    }

    /// Remove one of `id`; the line goes away when it would drop below 1.
    pub fn decrement(&mut self, id: AgentId) {
        if let Some(line) = self.lines.iter_mut().find(|l| l.agent.id == id) {
            line.quantity = line.quantity.saturating_sub(1);
        }
        self.lines.retain(|l| l.quantity > 0);
    }

    /// Drop the whole line for `id`.
    pub fn remove(&mut self, id: AgentId) {
        self.lines.retain(|l| l.agent.id != id);
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Sum of line totals.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Total number of licences across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines
            .iter()
            .fold(0u32, |acc, l| acc.saturating_add(l.quantity))
    }
}
