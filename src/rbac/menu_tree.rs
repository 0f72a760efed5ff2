//! # 菜单树构建
//!
//! 把扁平菜单列表按 `parent_id` 组装为森林。存储层不保证数据良构，因此：
//! - 重复 id 只保留第一次出现；
//! - 父节点不存在或指向自身时作为根节点；
//! - 同级（包括根）按 `sort_order` 升序，相同时保持输入顺序；
//! - 成环的节点组中输入顺序最靠前的节点被提升为根，环在该处断开。
//!
//! 全程迭代实现，不对输入数据做递归。

use serde::Serialize;
use std::collections::HashMap;

use entity::menus;

/// 菜单树节点
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuNode {
    #[serde(flatten)]
    pub menu: menus::Model,
    pub children: Vec<MenuNode>,
}

/// 前端路由节点
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteNode {
    pub id: i32,
    pub path: String,
    pub name: String,
    pub component: String,
    pub meta: RouteMeta,
    pub children: Vec<RouteNode>,
}

/// 路由元信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteMeta {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub is_hide: bool,
    pub keep_alive: bool,
    pub fixed_tab: bool,
    /// `None`：不限制；`Some([])`：任何角色都不可见
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
}

/// 构建菜单树
#[must_use]
pub fn build_tree(menus: &[menus::Model]) -> Vec<MenuNode> {
    assemble(menus, |menu, children| MenuNode {
        menu: menu.clone(),
        children,
    })
}

/// 构建路由树；提供 `role_codes_by_menu` 时每个节点标注可见的角色编码
#[must_use]
pub fn build_route_tree(
    menus: &[menus::Model],
    role_codes_by_menu: Option<&HashMap<i32, Vec<String>>>,
) -> Vec<RouteNode> {
    assemble(menus, |menu, children| RouteNode {
        id: menu.id,
        path: menu.path.clone().unwrap_or_default(),
        name: menu.name.clone(),
        component: menu.component.clone().unwrap_or_default(),
        meta: RouteMeta {
            title: menu.name.clone(),
            icon: menu.icon.clone().filter(|icon| !icon.is_empty()),
            is_hide: menu.hidden,
            keep_alive: false,
            fixed_tab: false,
            roles: role_codes_by_menu.map(|map| map.get(&menu.id).cloned().unwrap_or_default()),
        },
        children,
    })
}

/// 去重后的节点及其父子关系
struct Layout<'a> {
    nodes: Vec<&'a menus::Model>,
    roots: Vec<usize>,
    children: Vec<Vec<usize>>,
}

impl<'a> Layout<'a> {
    fn new(menus: &'a [menus::Model]) -> Self {
        let mut index: HashMap<i32, usize> = HashMap::with_capacity(menus.len());
        let mut nodes = Vec::with_capacity(menus.len());
        for menu in menus {
            if !index.contains_key(&menu.id) {
                index.insert(menu.id, nodes.len());
                nodes.push(menu);
            }
        }

        let mut parent: Vec<Option<usize>> = nodes
            .iter()
            .map(|menu| {
                menu.parent_id
                    .filter(|pid| *pid != menu.id)
                    .and_then(|pid| index.get(&pid).copied())
            })
            .collect();

        let mut roots = Vec::new();
        let mut children = vec![Vec::new(); nodes.len()];
        for (i, p) in parent.iter().enumerate() {
            match p {
                Some(p) => children[*p].push(i),
                None => roots.push(i),
            }
        }

        let mut layout = Self {
            nodes,
            roots,
            children,
        };
        layout.break_cycles(&mut parent);

        let sort_keys: Vec<i32> = layout.nodes.iter().map(|m| m.sort_order).collect();
        let order = |i: &usize| (sort_keys[*i], *i);
        layout.roots.sort_by_key(order);
        for list in &mut layout.children {
            list.sort_by_key(order);
        }
        layout
    }

    /// 从根不可达的节点必然处于环上或挂在环下；逐个找到环并在最靠前的节点处断开
    fn break_cycles(&mut self, parent: &mut [Option<usize>]) {
        let n = self.nodes.len();
        let mut reached = vec![false; n];
        for root in self.roots.clone() {
            self.mark_reached(root, &mut reached);
        }

        let mut walk_mark = vec![usize::MAX; n];
        for start in 0..n {
            if reached[start] {
                continue;
            }

            // 沿父指针前进直到重复，落点必在环上
            let mut current = start;
            while walk_mark[current] != start {
                walk_mark[current] = start;
                match parent[current] {
                    Some(p) => current = p,
                    None => break,
                }
            }

            let mut cut = current;
            let mut member = parent[current];
            while let Some(m) = member {
                if m == current {
                    break;
                }
                cut = cut.min(m);
                member = parent[m];
            }

            if let Some(p) = parent[cut].take() {
                self.children[p].retain(|c| *c != cut);
            }
            self.roots.push(cut);
            self.mark_reached(cut, &mut reached);
        }
    }

    fn mark_reached(&self, from: usize, reached: &mut [bool]) {
        let mut stack = vec![from];
        while let Some(i) = stack.pop() {
            if reached[i] {
                continue;
            }
            reached[i] = true;
            stack.extend(self.children[i].iter().copied());
        }
    }
}

/// 先序遍历后逆序组装，子节点总是先于父节点构建完成
fn assemble<T, F>(menus: &[menus::Model], mut make: F) -> Vec<T>
where
    F: FnMut(&menus::Model, Vec<T>) -> T,
{
    let layout = Layout::new(menus);

    let mut preorder = Vec::with_capacity(layout.nodes.len());
    let mut visited = vec![false; layout.nodes.len()];
    let mut stack: Vec<usize> = layout.roots.iter().rev().copied().collect();
    while let Some(i) = stack.pop() {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        preorder.push(i);
        stack.extend(layout.children[i].iter().rev().copied());
    }

    let mut built: Vec<Option<T>> = std::iter::repeat_with(|| None)
        .take(layout.nodes.len())
        .collect();
    for &i in preorder.iter().rev() {
        let kids = layout.children[i]
            .iter()
            .filter_map(|c| built[*c].take())
            .collect();
        built[i] = Some(make(layout.nodes[i], kids));
    }

    layout
        .roots
        .iter()
        .filter_map(|r| built[*r].take())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use pretty_assertions::assert_eq;

    fn menu(id: i32, parent_id: Option<i32>, sort_order: i32) -> menus::Model {
        menus::Model {
            id,
            parent_id,
            name: format!("menu-{id}"),
            path: Some(format!("/m/{id}")),
            component: None,
            menu_type: 1,
            icon: None,
            sort_order,
            hidden: false,
            created_at: NaiveDateTime::default(),
            updated_at: NaiveDateTime::default(),
        }
    }

    /// (id, 子树) 形式的结构摘要
    fn shape(nodes: &[MenuNode]) -> Vec<(i32, Vec<i32>)> {
        nodes
            .iter()
            .map(|n| (n.menu.id, n.children.iter().map(|c| c.menu.id).collect()))
            .collect()
    }

    fn count(nodes: &[MenuNode]) -> usize {
        nodes.iter().map(|n| 1 + count(&n.children)).sum()
    }

    #[test]
    fn test_children_grouped_and_ordered() {
        let menus = vec![
            menu(1, None, 2),
            menu(2, None, 1),
            menu(3, Some(1), 5),
            menu(4, Some(1), 0),
            menu(5, Some(1), 5),
        ];
        let tree = build_tree(&menus);
        assert_eq!(shape(&tree), vec![(2, vec![]), (1, vec![4, 3, 5])]);
    }

    #[test]
    fn test_dangling_parent_and_self_reference_become_roots() {
        let menus = vec![menu(1, Some(99), 0), menu(2, Some(2), 1)];
        let tree = build_tree(&menus);
        assert_eq!(shape(&tree), vec![(1, vec![]), (2, vec![])]);
    }

    #[test]
    fn test_duplicate_ids_first_wins() {
        let mut dup = menu(1, None, 0);
        dup.name = "dup".to_string();
        let menus = vec![menu(1, None, 0), dup, menu(2, Some(1), 0)];
        let tree = build_tree(&menus);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].menu.name, "menu-1");
        assert_eq!(count(&tree), 2);
    }

    #[test]
    fn test_cycle_terminates_with_every_node_once() {
        // 1 -> 2 -> 3 -> 1 成环，4 挂在 3 下，5 是正常根
        let menus = vec![
            menu(4, Some(3), 0),
            menu(1, Some(3), 0),
            menu(2, Some(1), 0),
            menu(3, Some(2), 0),
            menu(5, None, 0),
        ];
        let tree = build_tree(&menus);
        assert_eq!(count(&tree), 5);
        // 环在输入顺序最靠前的环成员（id 1）处断开
        assert_eq!(shape(&tree), vec![(1, vec![2]), (5, vec![])]);
        assert_eq!(tree[0].children[0].children[0].menu.id, 3);
        assert_eq!(tree[0].children[0].children[0].children[0].menu.id, 4);
    }

    #[test]
    fn test_deep_chain_does_not_recurse() {
        let menus: Vec<menus::Model> = (1..=20_000)
            .map(|id| menu(id, if id == 1 { None } else { Some(id - 1) }, 0))
            .collect();
        let tree = build_route_tree(&menus, None);
        assert_eq!(tree.len(), 1);

        // 逐层向下而不是递归地检查深度
        let mut depth = 1;
        let mut node = &tree[0];
        while let Some(child) = node.children.first() {
            node = child;
            depth += 1;
        }
        assert_eq!(depth, 20_000);
        // 深树的析构也不能递归到栈溢出
        let mut pending = tree;
        while let Some(mut n) = pending.pop() {
            pending.append(&mut n.children);
        }
    }

    #[test]
    fn test_route_roles_annotation() {
        let menus = vec![menu(1, None, 0), menu(2, Some(1), 0)];

        let unrestricted = build_route_tree(&menus, None);
        let json = serde_json::to_value(&unrestricted).unwrap();
        assert!(json[0]["meta"].get("roles").is_none());
        assert_eq!(json[0]["meta"]["isHide"], false);
        assert_eq!(json[0]["component"], "");

        let map: HashMap<i32, Vec<String>> = [(1, vec!["admin".to_string()])].into_iter().collect();
        let annotated = build_route_tree(&menus, Some(&map));
        assert_eq!(annotated[0].meta.roles, Some(vec!["admin".to_string()]));
        assert_eq!(annotated[0].children[0].meta.roles, Some(vec![]));
        let json = serde_json::to_value(&annotated).unwrap();
        assert_eq!(json[0]["children"][0]["meta"]["roles"], serde_json::json!([]));
    }
}
