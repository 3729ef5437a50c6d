use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::{
    CampusId, ClassroomId, ConstraintSettings, CourseId, DepartmentId, SectionId, TeacherId,
    TimeSlotId,
};

/// Splits a comma separated requirement or equipment list, dropping blanks.
pub fn split_items(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty())
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CourseSection {
    pub id: SectionId,
    pub course_id: CourseId,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub name: String,
    pub enrollment: u32,
    #[serde(default)]
    pub department_id: DepartmentId,
    #[serde(default)]
    pub department_name: String,
    #[serde(default)]
    pub required_room_type: Option<String>,
    #[serde(default)]
    pub required_equipment: Option<String>,
    /// "Male" / "Female" when the section is gender restricted.
    #[serde(default)]
    pub gender_restriction: Option<String>,
    /// Sections sharing a group id meet together in one room.
    #[serde(default)]
    pub cross_listed_group: Option<u32>,
}

impl CourseSection {
    pub fn room_type_requirement(&self) -> Option<&str> {
        self.required_room_type
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn equipment_items(&self) -> impl Iterator<Item = &str> {
        split_items(self.required_equipment.as_deref().unwrap_or(""))
    }

    pub fn has_special_requirement(&self) -> bool {
        self.room_type_requirement().is_some() || self.equipment_items().next().is_some()
    }

    pub fn gender(&self) -> Option<&str> {
        self.gender_restriction
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: TeacherId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub department_id: DepartmentId,
    /// 0 means no limit.
    #[serde(default)]
    pub max_weekly_hours: u32,
    #[serde(default)]
    pub max_daily_hours: u32,
    #[serde(default)]
    pub preferred_building: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Classroom {
    pub id: ClassroomId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub building: String,
    #[serde(default)]
    pub campus_id: CampusId,
    pub capacity: u32,
    #[serde(default)]
    pub room_type: String,
    #[serde(default)]
    pub equipment: String,
}

impl Classroom {
    /// Exact, case-sensitive item match after trimming.
    pub fn has_equipment(&self, item: &str) -> bool {
        split_items(&self.equipment).any(|e| e == item)
    }

    pub fn has_all_equipment(&self, section: &CourseSection) -> bool {
        section.equipment_items().all(|item| self.has_equipment(item))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub id: TimeSlotId,
    /// 1 = Monday .. 7 = Sunday.
    pub day_of_week: u8,
    pub start_minutes: u16,
    pub end_minutes: u16,
    #[serde(default = "regular_slot")]
    pub slot_type: String,
}

fn regular_slot() -> String {
    "Regular".into()
}

impl TimeSlot {
    pub fn is_ramadan(&self) -> bool {
        self.slot_type.eq_ignore_ascii_case("ramadan")
    }

    pub fn is_regular(&self) -> bool {
        self.slot_type.eq_ignore_ascii_case("regular")
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeacherCoursePreference {
    pub teacher_id: TeacherId,
    pub course_id: CourseId,
    /// 1..=5
    #[serde(default = "neutral_level")]
    pub proficiency_level: u8,
    /// 1..=5
    #[serde(default = "neutral_level")]
    pub preference_level: u8,
}

fn neutral_level() -> u8 {
    3
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeacherAvailability {
    pub teacher_id: TeacherId,
    pub timeslot_id: TimeSlotId,
    pub is_available: bool,
    #[serde(default)]
    pub preference_level: u8,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClassroomAvailability {
    pub classroom_id: ClassroomId,
    pub timeslot_id: TimeSlotId,
    pub is_available: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Immutable facts for one scheduling run.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingProblem {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub name: String,
    pub sections: Vec<CourseSection>,
    pub teachers: Vec<Teacher>,
    pub classrooms: Vec<Classroom>,
    pub timeslots: Vec<TimeSlot>,
    #[serde(default)]
    pub teacher_preferences: Vec<TeacherCoursePreference>,
    #[serde(default)]
    pub teacher_availability: Vec<TeacherAvailability>,
    #[serde(default)]
    pub classroom_availability: Vec<ClassroomAvailability>,
    /// Holiday slots, skipped when `settings.holiday_exclusions` is on.
    #[serde(default)]
    pub excluded_timeslots: Vec<TimeSlotId>,
    #[serde(default)]
    pub settings: ConstraintSettings,
}

impl SchedulingProblem {
    pub fn section(&self, id: SectionId) -> Option<&CourseSection> {
        self.sections.iter().find(|s| s.id == id)
    }

    pub fn teacher(&self, id: TeacherId) -> Option<&Teacher> {
        self.teachers.iter().find(|t| t.id == id)
    }

    pub fn classroom(&self, id: ClassroomId) -> Option<&Classroom> {
        self.classrooms.iter().find(|c| c.id == id)
    }

    pub fn timeslot(&self, id: TimeSlotId) -> Option<&TimeSlot> {
        self.timeslots.iter().find(|t| t.id == id)
    }

    pub fn preference(
        &self,
        teacher: TeacherId,
        course: CourseId,
    ) -> Option<&TeacherCoursePreference> {
        self.teacher_preferences
            .iter()
            .find(|p| p.teacher_id == teacher && p.course_id == course)
    }

    pub fn teacher_unavailable(&self, teacher: TeacherId, slot: TimeSlotId) -> bool {
        self.teacher_availability
            .iter()
            .any(|a| a.teacher_id == teacher && a.timeslot_id == slot && !a.is_available)
    }

    pub fn classroom_unavailable(&self, classroom: ClassroomId, slot: TimeSlotId) -> bool {
        self.classroom_availability
            .iter()
            .any(|a| a.classroom_id == classroom && a.timeslot_id == slot && !a.is_available)
    }

    /// True when the classroom has any blocked slot at all.
    pub fn classroom_has_blocked_slots(&self, classroom: ClassroomId) -> bool {
        self.classroom_availability
            .iter()
            .any(|a| a.classroom_id == classroom && !a.is_available)
    }

    /// Slots usable under the current Ramadan and holiday settings.
    pub fn usable_timeslots(&self) -> Vec<&TimeSlot> {
        let ramadan = self.settings.enable_ramadan_schedule;
        self.timeslots
            .iter()
            .filter(|t| {
                if ramadan {
                    t.is_ramadan() || t.is_regular()
                } else {
                    !t.is_ramadan()
                }
            })
            .filter(|t| {
                !(self.settings.holiday_exclusions && self.excluded_timeslots.contains(&t.id))
            })
            .collect()
    }

    pub fn cross_listed_groups(&self) -> BTreeMap<u32, Vec<&CourseSection>> {
        let mut groups: BTreeMap<u32, Vec<&CourseSection>> = BTreeMap::new();
        for s in &self.sections {
            if let Some(g) = s.cross_listed_group {
                groups.entry(g).or_default().push(s);
            }
        }
        groups.retain(|_, members| members.len() > 1);
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(id: u32, kind: &str) -> TimeSlot {
        TimeSlot {
            id: TimeSlotId(id),
            day_of_week: 1,
            start_minutes: 480,
            end_minutes: 570,
            slot_type: kind.into(),
        }
    }

    #[test]
    fn equipment_matching_is_itemwise() {
        let room = Classroom {
            id: ClassroomId(1),
            name: "A-101".into(),
            building: "A".into(),
            campus_id: CampusId(1),
            capacity: 30,
            room_type: "Lab".into(),
            equipment: "Projector, Computers ,Whiteboard".into(),
        };
        let mut section = CourseSection {
            id: SectionId(1),
            course_id: CourseId(1),
            code: "CS101-1".into(),
            name: "Intro".into(),
            enrollment: 20,
            department_id: DepartmentId(1),
            department_name: "CS".into(),
            required_room_type: None,
            required_equipment: Some("Projector,Computers".into()),
            gender_restriction: None,
            cross_listed_group: None,
        };
        assert!(room.has_all_equipment(&section));
        assert!(section.has_special_requirement());
        section.required_equipment = Some("projector".into());
        assert!(!room.has_all_equipment(&section));
        section.required_equipment = Some("Projector, Smartboard".into());
        assert!(!room.has_all_equipment(&section));
        section.required_equipment = Some(" , ".into());
        assert!(!section.has_special_requirement());
    }

    #[test]
    fn usable_slots_follow_ramadan_and_holidays() {
        let mut p = SchedulingProblem {
            timeslots: vec![slot(1, "Regular"), slot(2, "Ramadan"), slot(3, "Evening")],
            excluded_timeslots: vec![TimeSlotId(1)],
            ..Default::default()
        };
        let ids = |p: &SchedulingProblem| -> Vec<u32> {
            p.usable_timeslots().iter().map(|t| t.id.0).collect()
        };
        assert_eq!(ids(&p), vec![3]);
        p.settings.holiday_exclusions = false;
        assert_eq!(ids(&p), vec![1, 3]);
        p.settings.enable_ramadan_schedule = true;
        assert_eq!(ids(&p), vec![1, 2]);
    }
}
