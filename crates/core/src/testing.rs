//! Small problem builders shared by unit tests here and by downstream crates'
//! tests (behind the `testing` feature).

use types::{
    Assignment, AssignmentId, CampusId, Classroom, ClassroomId, CourseId, CourseSection,
    DepartmentId, SchedulingProblem, SchedulingSolution, SectionId, SolutionId, Teacher,
    TeacherId, TimeSlot, TimeSlotId,
};

/// Uniform problem: every section has 20 students, every room seats 40 in
/// building "A", slots run hourly from 08:00, eight per day.
#[derive(Clone, Debug, Default)]
pub struct Fixture {
    sections: u32,
    teachers: u32,
    classrooms: u32,
    timeslots: u32,
}

impl Fixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sections(mut self, n: u32) -> Self {
        self.sections = n;
        self
    }

    pub fn teachers(mut self, n: u32) -> Self {
        self.teachers = n;
        self
    }

    pub fn classrooms(mut self, n: u32) -> Self {
        self.classrooms = n;
        self
    }

    pub fn timeslots(mut self, n: u32) -> Self {
        self.timeslots = n;
        self
    }

    pub fn build(&self) -> SchedulingProblem {
        SchedulingProblem {
            id: 1,
            name: "fixture".into(),
            sections: (1..=self.sections).map(section).collect(),
            teachers: (1..=self.teachers).map(teacher).collect(),
            classrooms: (1..=self.classrooms).map(classroom).collect(),
            timeslots: (1..=self.timeslots).map(timeslot).collect(),
            ..Default::default()
        }
    }
}

pub fn section(i: u32) -> CourseSection {
    CourseSection {
        id: SectionId(i),
        course_id: CourseId(i),
        code: format!("S{i}"),
        name: format!("Section {i}"),
        enrollment: 20,
        department_id: DepartmentId(1),
        department_name: "Science".into(),
        required_room_type: None,
        required_equipment: None,
        gender_restriction: None,
        cross_listed_group: None,
    }
}

pub fn teacher(i: u32) -> Teacher {
    Teacher {
        id: TeacherId(i),
        name: format!("T{i}"),
        department_id: DepartmentId(1),
        max_weekly_hours: 0,
        max_daily_hours: 0,
        preferred_building: None,
    }
}

pub fn classroom(i: u32) -> Classroom {
    Classroom {
        id: ClassroomId(i),
        name: format!("R{i}"),
        building: "A".into(),
        campus_id: CampusId(1),
        capacity: 40,
        room_type: "Lecture".into(),
        equipment: "Projector".into(),
    }
}

pub fn timeslot(i: u32) -> TimeSlot {
    let k = i - 1;
    let start = 480 + (k % 8) as u16 * 60;
    TimeSlot {
        id: TimeSlotId(i),
        day_of_week: 1 + (k / 8) as u8,
        start_minutes: start,
        end_minutes: start + 50,
        slot_type: "Regular".into(),
    }
}

/// Unchecked solution from `(section, teacher, classroom, timeslot)` tuples.
pub fn raw(problem: &SchedulingProblem, binds: &[(u32, u32, u32, u32)]) -> SchedulingSolution {
    let assignments = binds
        .iter()
        .enumerate()
        .map(|(i, &(s, t, c, ts))| {
            let mut a =
                Assignment::new(problem, SectionId(s), TeacherId(t), ClassroomId(c), TimeSlotId(ts));
            a.id = AssignmentId(i as u32 + 1);
            a
        })
        .collect();
    SchedulingSolution::from_raw(SolutionId(1), problem.id, assignments)
}
