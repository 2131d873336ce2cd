//! Dependency graph — топология объявленных зависимостей компонентов.
//!
//! Арена узлов, адресуемых целочисленным индексом; рёбра хранятся списками
//! индексов. Такое представление не имеет ownership-циклов даже для
//! циклических графов, а BFS-проверки сводятся к обходу массивов.
//!
//! Граф строится один раз из полного набора [`DependencyContext`]
//! деклараций и после построения read-only: валидаторы посещают узлы, но
//! не мутируют топологию.

use std::collections::{HashMap, VecDeque};

use tracing::{debug, warn};

use crate::key::ComponentKey;

/// Декларация зависимостей одного компонента
#[derive(Debug, Clone)]
pub struct DependencyContext {
    pub key: ComponentKey,
    pub dependencies: Vec<ComponentKey>,
}

impl DependencyContext {
    pub fn new(key: ComponentKey, dependencies: Vec<ComponentKey>) -> Self {
        Self { key, dependencies }
    }

    /// Узел без исходящих зависимостей
    pub fn leaf(key: ComponentKey) -> Self {
        Self {
            key,
            dependencies: Vec::new(),
        }
    }
}

pub struct GraphNode {
    context: DependencyContext,
    /// Индексы узлов, от которых зависит этот узел
    edges: Vec<usize>,
    /// Обратные рёбра: кто зависит от этого узла
    dependents: Vec<usize>,
}

impl GraphNode {
    pub fn key(&self) -> &ComponentKey {
        &self.context.key
    }

    pub fn context(&self) -> &DependencyContext {
        &self.context
    }

    pub fn edges(&self) -> &[usize] {
        &self.edges
    }

    pub fn dependents(&self) -> &[usize] {
        &self.dependents
    }
}

pub struct DependencyGraph {
    nodes: Vec<GraphNode>,
    index: HashMap<ComponentKey, usize>,
    root: Option<usize>,
}

/// Статистика графа зависимостей
#[derive(Debug, Clone)]
pub struct GraphStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub max_outgoing: usize,
    pub max_incoming: usize,
    pub most_dependent: Option<String>,
    pub most_depended_upon: Option<String>,
}

impl DependencyGraph {
    /// Построить граф из полного набора деклараций.
    ///
    /// Ключи, встречающиеся только как зависимости, получают собственные
    /// листовые узлы. Повторная декларация ключа сливает списки
    /// зависимостей. Ровно один узел может быть помечен корнем.
    pub fn build(contexts: Vec<DependencyContext>, root: Option<&ComponentKey>) -> Self {
        let mut nodes: Vec<GraphNode> = Vec::new();
        let mut index: HashMap<ComponentKey, usize> = HashMap::new();

        for context in contexts {
            match index.get(&context.key).copied() {
                Some(existing) => {
                    nodes[existing]
                        .context
                        .dependencies
                        .extend(context.dependencies);
                }
                None => {
                    index.insert(context.key.clone(), nodes.len());
                    nodes.push(GraphNode {
                        context,
                        edges: Vec::new(),
                        dependents: Vec::new(),
                    });
                }
            }
        }

        // листовые узлы для ключей, объявленных только как зависимости
        let referenced: Vec<ComponentKey> = nodes
            .iter()
            .flat_map(|node| node.context.dependencies.iter().cloned())
            .filter(|key| !index.contains_key(key))
            .collect();
        for key in referenced {
            if !index.contains_key(&key) {
                index.insert(key.clone(), nodes.len());
                nodes.push(GraphNode {
                    context: DependencyContext::leaf(key),
                    edges: Vec::new(),
                    dependents: Vec::new(),
                });
            }
        }

        // рёбра по индексам; дубликаты рёбер схлопываются
        for i in 0..nodes.len() {
            let deps = nodes[i].context.dependencies.clone();
            for dep in deps {
                if let Some(&j) = index.get(&dep) {
                    if !nodes[i].edges.contains(&j) {
                        nodes[i].edges.push(j);
                        nodes[j].dependents.push(i);
                    }
                }
            }
        }

        let root = match root {
            Some(key) => match index.get(key) {
                Some(&i) => Some(i),
                None => {
                    warn!("root key {} is not part of the graph, ignoring", key);
                    None
                }
            },
            None => None,
        };

        debug!(
            "🔗 dependency graph built: {} nodes, {} edges",
            nodes.len(),
            nodes.iter().map(|n| n.edges.len()).sum::<usize>()
        );

        Self { nodes, index, root }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|node| node.edges.len()).sum()
    }

    pub fn index_of(&self, key: &ComponentKey) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn node(&self, index: usize) -> &GraphNode {
        &self.nodes[index]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ComponentKey> {
        self.nodes.iter().map(|node| node.key())
    }

    pub fn root_index(&self) -> Option<usize> {
        self.root
    }

    pub fn is_root(&self, index: usize) -> bool {
        self.root == Some(index)
    }

    /// Лист — узел без исходящих рёбер
    pub fn is_leaf(&self, index: usize) -> bool {
        self.nodes[index].edges.is_empty()
    }

    /// BFS от узла: вернуть замкнутый путь `start -> ... -> start`, если
    /// узел достижим из самого себя. `None` — цикла через узел нет.
    pub fn cycle_through(&self, start: usize) -> Option<Vec<usize>> {
        let mut visited = vec![false; self.nodes.len()];
        let mut parent: Vec<Option<usize>> = vec![None; self.nodes.len()];
        let mut queue = VecDeque::new();

        visited[start] = true;
        queue.push_back(start);

        while let Some(node) = queue.pop_front() {
            for &next in &self.nodes[node].edges {
                if next == start {
                    // восстановить путь назад до start и замкнуть
                    let mut chain = vec![node];
                    let mut current = node;
                    while current != start {
                        match parent[current] {
                            Some(p) => {
                                current = p;
                                chain.push(current);
                            }
                            None => break,
                        }
                    }
                    chain.reverse();
                    chain.push(start);
                    return Some(chain);
                }
                if !visited[next] {
                    visited[next] = true;
                    parent[next] = Some(node);
                    queue.push_back(next);
                }
            }
        }

        None
    }

    pub fn stats(&self) -> GraphStats {
        let mut max_outgoing = 0;
        let mut max_incoming = 0;
        let mut most_dependent = None;
        let mut most_depended_upon = None;

        for node in &self.nodes {
            if node.edges.len() > max_outgoing {
                max_outgoing = node.edges.len();
                most_dependent = Some(node.key().to_string());
            }
            if node.dependents.len() > max_incoming {
                max_incoming = node.dependents.len();
                most_depended_upon = Some(node.key().to_string());
            }
        }

        GraphStats {
            total_nodes: self.nodes.len(),
            total_edges: self.edge_count(),
            max_outgoing,
            max_incoming,
            most_dependent,
            most_depended_upon,
        }
    }

    /// Отчёт о графе для диагностики
    pub fn report(&self) -> String {
        let stats = self.stats();
        format!(
            "=== Dependency Graph Report ===\n\
             Total nodes: {}\n\
             Total edges: {}\n\
             Max outgoing dependencies: {}\n\
             Max incoming dependencies: {}\n\
             Most dependent: {}\n\
             Most depended upon: {}\n\
             ===============================",
            stats.total_nodes,
            stats.total_edges,
            stats.max_outgoing,
            stats.max_incoming,
            stats.most_dependent.as_deref().unwrap_or("None"),
            stats.most_depended_upon.as_deref().unwrap_or("None"),
        )
    }
}
