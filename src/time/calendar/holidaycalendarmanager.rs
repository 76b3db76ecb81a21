use std::cell::{
    RefCell,
    RefMut
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{NaiveDate, Weekday};
use serde::Deserialize;

use crate::manager::manager::IManager;
use crate::manager::managererror::{ManagerError, object_name, parse_json_value};
use crate::time::calendar::holidaycalendar::HolidayCalendar;
use crate::time::calendar::jointcalendar::JointCalendar;
use crate::time::calendar::simplecalendar::SimpleCalendar;

fn default_weekends() -> HashSet<Weekday> {
    HashSet::from([Weekday::Sat, Weekday::Sun])
}

#[derive(Deserialize)]
struct SimpleCalendarJsonProp {
    #[serde(default = "default_weekends")]
    weekends: HashSet<Weekday>,
    #[serde(default)]
    holidays: Vec<NaiveDate>,
    #[serde(default)]
    additional_business_days: Vec<NaiveDate>
}

#[derive(Deserialize)]
enum MethodOfJoint {
    Intersection,
    Union
}

#[derive(Deserialize)]
struct JointCalendarJsonProp {
    c1: String,
    c2: String,
    method_of_joint: MethodOfJoint
}

enum CalendarJson {
    Joint(JointCalendarJsonProp),
    Simple(SimpleCalendarJsonProp)
}

fn parse_calendar_json(json_value: serde_json::Value) -> Result<CalendarJson, ManagerError> {
    // 有 c1/c2 的物件是 JointCalendar，其餘都當成 SimpleCalendar
    if json_value.get("c1").is_some() {
        Ok(CalendarJson::Joint(parse_json_value(json_value)?))
    } else {
        Ok(CalendarJson::Simple(parse_json_value(json_value)?))
    }
}

/// Named holiday calendars loaded from JSON.
///
/// A joint calendar may reference calendars that appear later in the same
/// array, so `insert_obj_from_json_vec` keeps retrying the failed entries
/// until a full pass makes no progress.
pub struct HolidayCalendarManager {
    map_cell: RefCell<HashMap<String, Arc<dyn HolidayCalendar>>>
}

impl HolidayCalendarManager {
    pub fn new() -> HolidayCalendarManager {
        HolidayCalendarManager { map_cell: RefCell::new(HashMap::new()) }
    }

    /// 依名稱取出多個日曆並取聯集。
    pub fn joint(&self, names: &[String]) -> Result<Arc<dyn HolidayCalendar>, ManagerError> {
        let calendars = names
            .iter()
            .map(|name| self.get(name))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(JointCalendar::union_of(&calendars))
    }
}

impl Default for HolidayCalendarManager {
    fn default() -> Self {
        let manager = HolidayCalendarManager::new();
        manager.insert("WEEKENDS", Arc::new(SimpleCalendar::weekends_only()));
        manager
    }
}

impl IManager<Arc<dyn HolidayCalendar>> for HolidayCalendarManager {
    fn map(&self) -> RefMut<'_, HashMap<String, Arc<dyn HolidayCalendar>>> {
        self.map_cell.borrow_mut()
    }

    fn insert_obj_from_json(&self, json_value: serde_json::Value) -> Result<(), ManagerError> {
        let name = object_name(&json_value)?;
        let calendar: Arc<dyn HolidayCalendar> = match parse_calendar_json(json_value)? {
            CalendarJson::Simple(prop) => Arc::new(SimpleCalendar::new(
                prop.weekends,
                prop.holidays,
                prop.additional_business_days
            )),
            CalendarJson::Joint(prop) => {
                let c1 = self.get(&prop.c1)?;
                let c2 = self.get(&prop.c2)?;
                match prop.method_of_joint {
                    MethodOfJoint::Intersection => Arc::new(JointCalendar::intersection(c1, c2)),
                    MethodOfJoint::Union => Arc::new(JointCalendar::union(c1, c2))
                }
            }
        };
        self.insert(&name, calendar);
        Ok(())
    }

    fn insert_obj_from_json_vec(&self, json_vec: &[serde_json::Value]) -> Result<(), ManagerError> {
        let mut remain_indices: Vec<usize> = (0..json_vec.len()).collect();
        let mut result: Result<(), ManagerError> = Ok(());

        loop {
            let mut new_remain_indices: Vec<usize> = Vec::new();

            for &index in remain_indices.iter() {
                result = self.insert_obj_from_json(json_vec[index].clone());
                if result.is_err() {
                    new_remain_indices.push(index);
                }
            }

            if new_remain_indices.is_empty() || remain_indices == new_remain_indices {
                return result;
            }

            remain_indices = new_remain_indices;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn joint_calendar_may_precede_its_parts() {
        let manager = HolidayCalendarManager::default();
        manager
            .insert_obj_from_json_vec(&[
                json!({"name": "NYB+LNB", "c1": "NYB", "c2": "LNB", "method_of_joint": "Union"}),
                json!({"name": "NYB", "holidays": ["2022-10-10"]}),
                json!({"name": "LNB", "weekends": ["Sat", "Sun"], "holidays": ["2022-08-29"]}),
            ])
            .unwrap();
        let joint = manager.get("NYB+LNB").unwrap();
        assert!(joint.is_holiday(ymd(2022, 10, 10)));
        assert!(joint.is_holiday(ymd(2022, 8, 29)));
        assert!(manager.contains("WEEKENDS"));
    }

    #[test]
    fn dangling_reference_fails() {
        let manager = HolidayCalendarManager::new();
        let result = manager.insert_obj_from_json_vec(&[
            json!({"name": "X", "c1": "A", "c2": "B", "method_of_joint": "Intersection"}),
        ]);
        assert!(matches!(result, Err(ManagerError::NameNotFoundError(_))));
    }

    #[test]
    fn joint_by_names() {
        let manager = HolidayCalendarManager::default();
        manager.insert_obj_from_json(json!({"name": "NYB", "holidays": ["2022-10-10"]})).unwrap();
        let cal = manager.joint(&["NYB".to_owned(), "WEEKENDS".to_owned()]).unwrap();
        assert_eq!(cal.nearest_business_day(ymd(2022, 10, 8)), ymd(2022, 10, 11));
        assert!(manager.joint(&["MISSING".to_owned()]).is_err());
    }
}
