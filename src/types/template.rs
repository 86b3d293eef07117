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

use serde::Deserialize;
use serde::Serialize;

use crate::types::card::FieldId;
use crate::types::card::TemplateId;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Shown from the start.
    Display,
    /// Shown once the card is submitted.
    Reveal,
    /// The learner types the field's text before it is shown.
    Type,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateField {
    pub id: FieldId,
    pub title: String,
    pub is_required: bool,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct LayoutItem {
    pub field: FieldId,
    pub operation: Operation,
}

/// The stored part of a template: what fields a card has and how they are
/// laid out during study.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct TemplateContent {
    pub fields: Vec<TemplateField>,
    pub layout: Vec<LayoutItem>,
}

impl Default for TemplateContent {
    fn default() -> Self {
        Self {
            fields: vec![
                TemplateField {
                    id: 1,
                    title: "Front".to_string(),
                    is_required: true,
                },
                TemplateField {
                    id: 2,
                    title: "Back".to_string(),
                    is_required: true,
                },
            ],
            layout: vec![
                LayoutItem {
                    field: 1,
                    operation: Operation::Display,
                },
                LayoutItem {
                    field: 2,
                    operation: Operation::Type,
                },
            ],
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct Template {
    pub id: TemplateId,
    pub title: String,
    pub content: TemplateContent,
}

impl Template {
    /// Whether any field asks the learner to type an answer.
    pub fn requires_input(&self) -> bool {
        self.content
            .layout
            .iter()
            .any(|item| item.operation == Operation::Type)
    }

    /// The field that should receive focus first, if any.
    pub fn first_input_field(&self) -> Option<FieldId> {
        self.content
            .layout
            .iter()
            .find(|item| item.operation == Operation::Type)
            .map(|item| item.field)
    }

    pub fn field(&self, id: FieldId) -> Option<&TemplateField> {
        self.content.fields.iter().find(|field| field.id == id)
    }
}
