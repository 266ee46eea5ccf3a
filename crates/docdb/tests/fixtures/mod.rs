#![allow(dead_code)]

use docdb::prelude::*;

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct City {
    pub name: String,
    pub postal_code: i32,
}

impl Model for City {
    const TYPE_NAME: &'static str = "City";
    const INDEXES: &'static [IndexModel<Self>] =
        &[IndexModel::new("name", &["name"], |city: &City| vec![Value::from(&city.name)])];

    fn id(&self) -> Vec<Value> {
        vec![Value::from(self.postal_code)]
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Date {
    pub day: i32,
    pub month: i32,
    pub year: i32,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Adult {
    pub first_name: String,
    pub last_name: String,
    pub birth: Date,
}

impl Adult {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl Model for Adult {
    const TYPE_NAME: &'static str = "Adult";
    const INDEXES: &'static [IndexModel<Self>] = &[
        IndexModel::new("firstName", &["first_name"], |adult: &Adult| {
            vec![Value::from(&adult.first_name)]
        }),
        IndexModel::new("birth", &["year", "month", "day"], |adult: &Adult| {
            vec![
                Value::from(adult.birth.year),
                Value::from(adult.birth.month),
                Value::from(adult.birth.day),
            ]
        }),
    ];

    fn id(&self) -> Vec<Value> {
        vec![Value::from(&self.last_name)]
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Birth {
    pub adult: Key<Adult>,
    pub city: Key<City>,
}

impl Model for Birth {
    const TYPE_NAME: &'static str = "Birth";

    fn id(&self) -> Vec<Value> {
        vec![Value::from(&self.adult)]
    }
}

pub fn date(day: i32, month: i32, year: i32) -> Date {
    Date { day, month, year }
}

pub fn adult(first_name: &str, last_name: &str, birth: Date) -> Adult {
    Adult {
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        birth,
    }
}

pub fn city(name: &str, postal_code: i32) -> City {
    City {
        name: name.to_string(),
        postal_code,
    }
}

pub fn salomon() -> Adult {
    adult("Salomon", "BRYS", date(15, 12, 1986))
}

pub fn laila() -> Adult {
    adult("Laila", "BRYS-ATIE", date(25, 8, 1989))
}

pub fn sjeg() -> City {
    city("Saint Julien En Genevois", 74160)
}

pub fn paris() -> City {
    city("Paris", 75000)
}

pub fn pap() -> City {
    city("Pointe À Pitre", 97110)
}

/// Open a fresh store over a memory engine.
pub fn open_db(options: DbOptions) -> (MemoryEngine, Db) {
    let engine = MemoryEngine::new();
    let db = Db::open(engine.clone(), options).expect("memory store opens");

    (engine, db)
}

/// Register the fixture types and store three cities, two adults and
/// their births.
pub fn inflate(db: &Db) {
    db.register::<City>().expect("register City");
    db.register::<Adult>().expect("register Adult");
    db.register::<Birth>().expect("register Birth");

    let sjeg = db.put(sjeg()).expect("put sjeg");
    db.put(paris()).expect("put paris");
    let pap = db.put(pap()).expect("put pap");

    let salomon = db.put(salomon()).expect("put salomon");
    let laila = db.put(laila()).expect("put laila");

    db.put(Birth {
        adult: salomon,
        city: sjeg,
    })
    .expect("put salomon's birth");
    db.put(Birth {
        adult: laila,
        city: pap,
    })
    .expect("put laila's birth");
}

/// Collect the records of a typed cursor.
pub fn models<M: Model + Clone>(cursor: docdb::db::Cursor<M>) -> Vec<M> {
    cursor
        .models()
        .map(|model| model.expect("cursor yields records").as_ref().clone())
        .collect()
}
