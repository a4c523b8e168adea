use serde_json::json;

/// Memory usage report for a component: a tree of leaf entries
/// (container name, element count, element size) with named subtrees
/// for owned sub-components.
pub struct ContainerInfo(Vec<Entry>);

enum Entry {
    Leaf {
        name: String,
        count: usize,
        element_size: usize,
    },
    Node {
        name: String,
        children: ContainerInfo,
    },
}

impl ContainerInfo {
    pub fn builder() -> ContainerInfoBuilder {
        ContainerInfoBuilder(Vec::new())
    }

    pub fn into_json(self) -> serde_json::Value {
        let mut data = serde_json::Map::new();
        for entry in self.0 {
            let (name, value) = match entry {
                Entry::Leaf {
                    name,
                    count,
                    element_size,
                } => (
                    name,
                    json!({
                        "count": count.to_string(),
                        "size": element_size.to_string()
                    }),
                ),
                Entry::Node { name, children } => (name, children.into_json()),
            };
            data.insert(name, value);
        }
        serde_json::Value::Object(data)
    }
}

pub struct ContainerInfoBuilder(Vec<Entry>);

impl ContainerInfoBuilder {
    pub fn leaf(mut self, name: impl Into<String>, count: usize, element_size: usize) -> Self {
        self.0.push(Entry::Leaf {
            name: name.into(),
            count,
            element_size,
        });
        self
    }

    pub fn node(mut self, name: impl Into<String>, children: ContainerInfo) -> Self {
        self.0.push(Entry::Node {
            name: name.into(),
            children,
        });
        self
    }

    pub fn finish(self) -> ContainerInfo {
        ContainerInfo(self.0)
    }
}

impl<const N: usize> From<[(&'static str, usize, usize); N]> for ContainerInfo {
    fn from(value: [(&'static str, usize, usize); N]) -> Self {
        let mut builder = ContainerInfo::builder();
        for (name, count, element_size) in value {
            builder = builder.leaf(name, count, element_size);
        }
        builder.finish()
    }
}
