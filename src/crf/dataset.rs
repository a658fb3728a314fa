/// An item is the list of feature ids active at one position
pub type Item = Vec<u32>;

/// An instance consists of a sequence of items and labels
#[derive(Debug, Clone, Default)]
pub struct Instance {
    /// Array of the item sequence
    pub items: Vec<Item>,
    /// Array of the label sequence
    pub labels: Vec<u32>,
}

impl Instance {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            items: Vec::with_capacity(cap),
            labels: Vec::with_capacity(cap),
        }
    }

    pub fn push(&mut self, item: Item, label: u32) {
        self.items.push(item);
        self.labels.push(label);
    }
}
