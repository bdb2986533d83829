//! 髒標記追蹤

use mrp_calc::BomGraph;
use mrp_core::PlanningSnapshot;
use std::collections::{BTreeMap, BTreeSet};

/// 物料被標記的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChangeKind {
    /// 物料主檔或其工作日曆
    MasterData,
    /// BOM 結構
    Bom,
    Demand,
    Supply,
    Inventory,
    /// 確認/已下達訂單
    FirmedOrder,
}

/// 髒標記追蹤器
#[derive(Debug, Clone, Default)]
pub struct DirtyTracker {
    dirty_items: BTreeMap<String, BTreeSet<ChangeKind>>,
}

impl DirtyTracker {
    /// 創建新的追蹤器
    pub fn new() -> Self {
        Self::default()
    }

    /// 標記物料為髒
    pub fn mark_dirty(&mut self, item_id: impl Into<String>, kind: ChangeKind) {
        self.dirty_items.entry(item_id.into()).or_default().insert(kind);
    }

    pub fn mark_all<I, S>(&mut self, item_ids: I, kind: ChangeKind)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for item_id in item_ids {
            self.mark_dirty(item_id, kind);
        }
    }

    /// 檢查物料是否為髒
    pub fn is_dirty(&self, item_id: &str) -> bool {
        self.dirty_items.contains_key(item_id)
    }

    pub fn reasons(&self, item_id: &str) -> Option<&BTreeSet<ChangeKind>> {
        self.dirty_items.get(item_id)
    }

    pub fn is_empty(&self) -> bool {
        self.dirty_items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dirty_items.len()
    }

    /// 清除所有髒標記
    pub fn clear(&mut self) {
        self.dirty_items.clear();
    }

    /// 獲取所有髒物料
    pub fn dirty_items(&self) -> BTreeSet<String> {
        self.dirty_items.keys().cloned().collect()
    }

    /// 受影響物料 = 髒物料 + 其所有 BOM 子孫
    pub fn expand(&self, graph: &BomGraph) -> BTreeSet<String> {
        let mut affected = self.dirty_items();
        affected.extend(graph.descendants_of(self.dirty_items.keys().map(String::as_str)));
        affected
    }

    /// 比對前後兩份快照，標記輸入有差異的物料
    ///
    /// 工藝路線與工作中心只影響產能計劃，不列入比對。
    pub fn diff(prior: &PlanningSnapshot, current: &PlanningSnapshot) -> Self {
        let mut tracker = Self::new();

        tracker.mark_all(
            changed_keys(&prior.items, &current.items, |i| &i.item_id),
            ChangeKind::MasterData,
        );

        // 日曆變更影響所有使用該日曆的物料
        let calendars = changed_keys(&prior.calendars, &current.calendars, |c| &c.calendar_id);
        tracker.mark_all(
            current
                .items
                .iter()
                .filter(|i| i.calendar_id.as_ref().is_some_and(|c| calendars.contains(c)))
                .map(|i| i.item_id.clone()),
            ChangeKind::MasterData,
        );

        // BOM：父件與新舊子件都需要重算
        let parents = changed_keys(&prior.bom_lines, &current.bom_lines, |l| &l.parent_id);
        tracker.mark_all(parents.iter().cloned(), ChangeKind::Bom);
        tracker.mark_all(
            prior
                .bom_lines
                .iter()
                .chain(&current.bom_lines)
                .filter(|l| parents.contains(&l.parent_id))
                .map(|l| l.component_id.clone()),
            ChangeKind::Bom,
        );

        tracker.mark_all(
            changed_keys(&prior.demands, &current.demands, |d| &d.item_id),
            ChangeKind::Demand,
        );
        tracker.mark_all(
            changed_keys(
                &prior.scheduled_receipts,
                &current.scheduled_receipts,
                |s| &s.item_id,
            ),
            ChangeKind::Supply,
        );
        tracker.mark_all(
            changed_keys(&prior.inventories, &current.inventories, |i| &i.item_id),
            ChangeKind::Inventory,
        );
        tracker.mark_all(
            changed_keys(&prior.firmed_orders, &current.firmed_orders, |o| &o.item_id),
            ChangeKind::FirmedOrder,
        );

        tracing::debug!("快照比對完成，髒物料 {} 個", tracker.len());
        tracker
    }
}

/// 依鍵分組比對，回傳內容不同的鍵
fn changed_keys<T, F>(prior: &[T], current: &[T], key: F) -> BTreeSet<String>
where
    T: PartialEq,
    F: Fn(&T) -> &String,
{
    fn group<'a, T, F: Fn(&T) -> &String>(records: &'a [T], key: &F) -> BTreeMap<String, Vec<&'a T>> {
        let mut grouped: BTreeMap<String, Vec<&'a T>> = BTreeMap::new();
        for record in records {
            grouped.entry(key(record).clone()).or_default().push(record);
        }
        grouped
    }
    let before = group(prior, &key);
    let after = group(current, &key);

    before
        .keys()
        .chain(after.keys())
        .filter(|k| before.get(*k) != after.get(*k))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use mrp_core::{BomLine, Demand, DemandType, Inventory, Item, ProcurementType};
    use rust_decimal::Decimal;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, d).unwrap()
    }

    fn snapshot() -> PlanningSnapshot {
        PlanningSnapshot::new(
            vec![
                Item::new("BIKE", 2, ProcurementType::Make),
                Item::new("FRAME", 3, ProcurementType::Make),
                Item::new("TUBE", 4, ProcurementType::Buy),
                Item::new("WHEEL", 5, ProcurementType::Buy),
            ],
            vec![
                BomLine::new("BIKE", "FRAME", Decimal::ONE),
                BomLine::new("FRAME", "TUBE", Decimal::from(3)),
                BomLine::new("BIKE", "WHEEL", Decimal::from(2)),
            ],
        )
        .with_demands(vec![Demand::new("BIKE", Decimal::from(50), date(25), DemandType::SalesOrder)])
        .with_inventories(vec![Inventory::new("WHEEL", Decimal::from(20))])
    }

    #[test]
    fn test_mark_and_clear() {
        let mut tracker = DirtyTracker::new();
        tracker.mark_dirty("FRAME", ChangeKind::Demand);
        tracker.mark_dirty("FRAME", ChangeKind::Supply);

        assert!(tracker.is_dirty("FRAME"));
        assert!(!tracker.is_dirty("BIKE"));
        assert_eq!(tracker.reasons("FRAME").map(|r| r.len()), Some(2));

        tracker.clear();
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_changed_keys_ignore_order_across_items() {
        let prior = vec![
            Inventory::new("FRAME", Decimal::from(5)),
            Inventory::new("WHEEL", Decimal::from(8)),
        ];
        let reordered = vec![prior[1].clone(), prior[0].clone()];
        assert!(changed_keys(&prior, &reordered, |i| &i.item_id).is_empty());

        let changed = vec![prior[0].clone(), Inventory::new("WHEEL", Decimal::from(9))];
        let keys = changed_keys(&prior, &changed, |i| &i.item_id);
        assert_eq!(keys.into_iter().collect::<Vec<_>>(), vec!["WHEEL".to_string()]);
    }

    #[test]
    fn test_identical_snapshots_are_clean() {
        let snapshot = snapshot();
        assert!(DirtyTracker::diff(&snapshot, &snapshot.clone()).is_empty());
    }

    #[test]
    fn test_diff_detects_demand_and_inventory() {
        let prior = snapshot();
        let mut current = prior.clone();
        current
            .demands
            .push(Demand::new("FRAME", Decimal::from(5), date(20), DemandType::SalesOrder));
        current.inventories[0].available_qty = Decimal::from(15);

        let tracker = DirtyTracker::diff(&prior, &current);

        assert_eq!(tracker.dirty_items(), BTreeSet::from(["FRAME".to_string(), "WHEEL".to_string()]));
        assert!(tracker.reasons("WHEEL").is_some_and(|r| r.contains(&ChangeKind::Inventory)));
    }

    #[test]
    fn test_removed_bom_line_marks_old_component() {
        let prior = snapshot();
        let mut current = prior.clone();
        current.bom_lines.retain(|l| l.component_id != "WHEEL");

        let tracker = DirtyTracker::diff(&prior, &current);

        assert!(tracker.is_dirty("BIKE"));
        assert!(tracker.is_dirty("WHEEL"));
        assert!(tracker.is_dirty("FRAME"));
    }

    #[test]
    fn test_expand_includes_descendants() {
        let snapshot = snapshot();
        let graph = BomGraph::build(&snapshot.items, &snapshot.bom_lines).unwrap();
        let mut tracker = DirtyTracker::new();
        tracker.mark_dirty("FRAME", ChangeKind::MasterData);

        assert_eq!(
            tracker.expand(&graph),
            BTreeSet::from(["FRAME".to_string(), "TUBE".to_string()])
        );
    }
}
