use std::collections::BTreeMap;

use crate::types::outline::{OutlineNode, ReviewScope};
use crate::types::reference::{LanguageTag, Reference};

/// 一次分配的结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Allocation {
    /// orderIndex -> 按全局编号升序排列的文献
    pub assignments: BTreeMap<usize, Vec<Reference>>,
    /// 大纲中没有任何可接收节点时剩下的文献
    pub unplaced: Vec<Reference>,
}

impl Allocation {
    /// 移交某个节点的文献列表
    pub fn take(&mut self, order_index: usize) -> Vec<Reference> {
        self.assignments.remove(&order_index).unwrap_or_default()
    }

    pub fn get(&self, order_index: usize) -> &[Reference] {
        self.assignments
            .get(&order_index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn assigned_count(&self) -> usize {
        self.assignments.values().map(Vec::len).sum()
    }
}

/// 按语言与综述范围把文献装箱到各章节
#[derive(Debug, Default)]
pub struct ReferenceAllocator;

#[derive(Debug, Default)]
struct TargetBuckets {
    domestic: Vec<usize>,
    foreign: Vec<usize>,
    general: Vec<usize>,
    last_content: Option<usize>,
}

impl TargetBuckets {
    fn classify(outline: &[OutlineNode]) -> Self {
        let mut buckets = TargetBuckets::default();
        for node in outline.iter().filter(|node| !node.is_parent) {
            let index = node.order_index;
            if node.kind().is_content() {
                buckets.last_content = Some(buckets.last_content.map_or(index, |i| i.max(index)));
            }
            match ReviewScope::classify(&node.title) {
                Some(ReviewScope::Domestic) => buckets.domestic.push(index),
                Some(ReviewScope::Foreign) => buckets.foreign.push(index),
                Some(ReviewScope::General) => buckets.general.push(index),
                None => {}
            }
        }
        buckets
    }
}

impl ReferenceAllocator {
    pub fn new() -> Self {
        Self
    }

    pub fn allocate(&self, references: &[Reference], outline: &[OutlineNode]) -> Allocation {
        let mut allocation = Allocation::default();
        if references.is_empty() {
            return allocation;
        }

        let (cn_refs, en_refs): (Vec<Reference>, Vec<Reference>) = references
            .iter()
            .cloned()
            .partition(|r| r.language_tag == LanguageTag::CN);

        let buckets = TargetBuckets::classify(outline);

        let mut remainder = Self::assign_chunks(&mut allocation, cn_refs, &buckets.domestic);
        remainder.extend(Self::assign_chunks(&mut allocation, en_refs, &buckets.foreign));
        remainder.sort_by_key(|r| r.global_index);

        let remainder = Self::assign_chunks(&mut allocation, remainder, &buckets.general);
        if !remainder.is_empty() {
            match buckets.last_content {
                Some(index) => allocation
                    .assignments
                    .entry(index)
                    .or_default()
                    .extend(remainder),
                None => allocation.unplaced = remainder,
            }
        }

        for refs in allocation.assignments.values_mut() {
            refs.sort_by_key(|r| r.global_index);
        }
        allocation
    }

    /// 把文献按连续块均分给目标节点，目标为空时原样返回
    fn assign_chunks(
        allocation: &mut Allocation,
        refs: Vec<Reference>,
        targets: &[usize],
    ) -> Vec<Reference> {
        if targets.is_empty() {
            return refs;
        }
        if refs.is_empty() {
            return Vec::new();
        }

        let chunk_size = refs.len().div_ceil(targets.len());
        let mut chunks = refs.chunks(chunk_size);
        for &index in targets {
            match chunks.next() {
                Some(chunk) => allocation
                    .assignments
                    .entry(index)
                    .or_default()
                    .extend_from_slice(chunk),
                None => break,
            }
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::references::ReferenceStore;
    use crate::types::outline::Outline;

    fn outline(titles: &[&str]) -> Outline {
        Outline::new(titles.iter().map(|t| OutlineNode::new(*t, 500)).collect())
    }

    fn indexes(refs: &[Reference]) -> Vec<usize> {
        refs.iter().map(|r| r.global_index).collect()
    }

    fn assert_exact_coverage(allocation: &Allocation, total: usize) {
        let mut seen: Vec<usize> = allocation
            .assignments
            .values()
            .flat_map(|refs| refs.iter().map(|r| r.global_index))
            .chain(allocation.unplaced.iter().map(|r| r.global_index))
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (1..=total).collect::<Vec<_>>());
    }

    #[test]
    fn test_language_affinity_buckets() {
        let store = ReferenceStore::parse("张三. A\nSmith. B\n李四. C\nDoe. D\n王五. E");
        let outline = outline(&["摘要", "1.2 国内研究现状", "1.3 国外研究现状", "第二章 结论"]);
        let allocation = ReferenceAllocator::new().allocate(store.references(), outline.nodes());

        assert_eq!(indexes(allocation.get(1)), vec![1, 3, 5]);
        assert_eq!(indexes(allocation.get(2)), vec![2, 4]);
        assert!(allocation.get(0).is_empty());
        assert!(allocation.get(3).is_empty());
        assert_exact_coverage(&allocation, 5);
    }

    #[test]
    fn test_chunks_split_contiguously() {
        let store = ReferenceStore::parse("张一\n张二\n张三\n张四\n张五");
        let outline = outline(&["国内研究现状（上）", "国内研究现状（下）"]);
        let allocation = ReferenceAllocator::new().allocate(store.references(), outline.nodes());

        assert_eq!(indexes(allocation.get(0)), vec![1, 2, 3]);
        assert_eq!(indexes(allocation.get(1)), vec![4, 5]);
    }

    #[test]
    fn test_more_targets_than_references_skips_empty_chunks() {
        let store = ReferenceStore::parse("张一");
        let outline = outline(&["国内研究现状一", "国内研究现状二", "国内研究现状三"]);
        let allocation = ReferenceAllocator::new().allocate(store.references(), outline.nodes());

        assert_eq!(indexes(allocation.get(0)), vec![1]);
        assert!(!allocation.assignments.contains_key(&1));
        assert!(!allocation.assignments.contains_key(&2));
    }

    #[test]
    fn test_remainder_flows_to_general_bucket_in_global_order() {
        let store = ReferenceStore::parse("Smith. A\n张三. B\nDoe. C\n李四. D");
        let outline = outline(&["1.1 研究背景", "1.2 文献综述", "3.1 实证分析"]);
        let allocation = ReferenceAllocator::new().allocate(store.references(), outline.nodes());

        assert_eq!(indexes(allocation.get(0)), vec![1, 2]);
        assert_eq!(indexes(allocation.get(1)), vec![3, 4]);
        assert_exact_coverage(&allocation, 4);
    }

    #[test]
    fn test_remainder_sinks_into_last_content_node() {
        let store = ReferenceStore::parse("张三. 论A. 2020\nSmith. On B. 2019\nDoe. C");
        let outline = outline(&["国内研究现状", "3.1 数据分析", "结论", "参考文献", "致谢"]);
        let allocation = ReferenceAllocator::new().allocate(store.references(), outline.nodes());

        assert_eq!(indexes(allocation.get(0)), vec![1]);
        assert_eq!(indexes(allocation.get(2)), vec![2, 3]);
        assert!(allocation.unplaced.is_empty());
    }

    #[test]
    fn test_parent_nodes_never_receive_references() {
        let store = ReferenceStore::parse("张三. A");
        let outline = Outline::new(vec![
            OutlineNode::parent("第一章 国内研究现状"),
            OutlineNode::new("1.1 引言", 300),
        ]);
        let allocation = ReferenceAllocator::new().allocate(store.references(), outline.nodes());

        assert!(allocation.get(0).is_empty());
        assert_eq!(indexes(allocation.get(1)), vec![1]);
    }

    #[test]
    fn test_no_sink_leaves_remainder_unplaced() {
        let store = ReferenceStore::parse("张三. A\nSmith. B");
        let outline = outline(&["摘要", "参考文献"]);
        let allocation = ReferenceAllocator::new().allocate(store.references(), outline.nodes());

        assert!(allocation.assignments.is_empty());
        assert_eq!(indexes(&allocation.unplaced), vec![1, 2]);
        assert_exact_coverage(&allocation, 2);
    }

    #[test]
    fn test_every_assignment_is_strictly_ascending() {
        let raw: String = (0..23)
            .map(|i| {
                if i % 3 == 0 {
                    format!("Author{}. Paper\n", i)
                } else {
                    format!("作者{}. 论文\n", i)
                }
            })
            .collect();
        let store = ReferenceStore::parse(&raw);
        let outline = outline(&[
            "摘要",
            "1.1 研究背景",
            "1.2 国内研究现状",
            "1.3 国外研究现状",
            "1.4 我国研究综述",
            "2.1 理论基础",
            "结论",
        ]);
        let allocation = ReferenceAllocator::new().allocate(store.references(), outline.nodes());

        for refs in allocation.assignments.values() {
            assert!(refs.windows(2).all(|w| w[0].global_index < w[1].global_index));
        }
        assert_exact_coverage(&allocation, 23);
        assert_eq!(allocation.assigned_count(), 23);
    }

    #[test]
    fn test_take_moves_assignment_out() {
        let store = ReferenceStore::parse("张三. A");
        let outline = outline(&["国内研究现状"]);
        let mut allocation =
            ReferenceAllocator::new().allocate(store.references(), outline.nodes());

        assert_eq!(indexes(&allocation.take(0)), vec![1]);
        assert!(allocation.take(0).is_empty());
    }
}
