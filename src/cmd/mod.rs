// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

pub mod check;
pub mod drill;
pub mod import;
pub mod init;
pub mod lessons;
pub mod reset;

use std::path::Path;

use crate::config::LearningSettings;
use crate::db::Database;
use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::error::fail;

/// Open an existing database along with its settings file.
pub fn open_database(db_path: &Path) -> Fallible<Database> {
    if !db_path.exists() {
        return fail(format!(
            "database {} does not exist. Run `koloda init` first.",
            db_path.display()
        ));
    }
    create_database(db_path)
}

fn create_database(db_path: &Path) -> Fallible<Database> {
    let settings = LearningSettings::load(&LearningSettings::path_for(db_path))?;
    let path = db_path
        .to_str()
        .ok_or_else(|| ErrorReport::new("invalid path"))?;
    Database::new(path, settings)
}
