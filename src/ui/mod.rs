//! Numeric transform fields
//!
//! Nine text inputs mirror the selected node's position, rotation (degrees)
//! and scale. Writes flow both ways: the node is copied into the fields on
//! selection and on every gizmo change, and user edits are parsed back into
//! the node. A single guard flag is held while fields are written
//! programmatically, so change notifications raised by those writes are not
//! applied back to the node.

use crate::scene::Transform;

/// Lower bound applied to scale edits.
pub const MIN_SCALE: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldId {
    PositionX,
    PositionY,
    PositionZ,
    RotationX,
    RotationY,
    RotationZ,
    ScaleX,
    ScaleY,
    ScaleZ,
}

impl FieldId {
    pub const ALL: [FieldId; 9] = [
        FieldId::PositionX,
        FieldId::PositionY,
        FieldId::PositionZ,
        FieldId::RotationX,
        FieldId::RotationY,
        FieldId::RotationZ,
        FieldId::ScaleX,
        FieldId::ScaleY,
        FieldId::ScaleZ,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn axis(self) -> usize {
        self.index() % 3
    }

    pub fn label(self) -> &'static str {
        match self {
            FieldId::PositionX => "pos x",
            FieldId::PositionY => "pos y",
            FieldId::PositionZ => "pos z",
            FieldId::RotationX => "rot x",
            FieldId::RotationY => "rot y",
            FieldId::RotationZ => "rot z",
            FieldId::ScaleX => "scale x",
            FieldId::ScaleY => "scale y",
            FieldId::ScaleZ => "scale z",
        }
    }

    fn component(self) -> Component {
        match self.index() / 3 {
            0 => Component::Position,
            1 => Component::Rotation,
            _ => Component::Scale,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Component {
    Position,
    Rotation,
    Scale,
}

/// A change notification from one text field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInput {
    pub field: FieldId,
    pub text: String,
}

/// The text-field surface the sync writes to.
pub trait FieldView {
    /// Replace a field's text. A view that raises change notifications for
    /// programmatic writes returns that notification.
    fn write(&mut self, field: FieldId, text: &str) -> Option<FieldInput>;

    fn read(&self, field: FieldId) -> &str;
}

/// In-memory field set.
#[derive(Debug, Clone, Default)]
pub struct TextFields {
    values: [String; 9],
    echo_writes: bool,
}

impl TextFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise a change notification for every programmatic write, like an
    /// input element that dispatches on assignment.
    pub fn echoing() -> Self {
        Self {
            echo_writes: true,
            ..Self::default()
        }
    }

    pub fn is_blank(&self) -> bool {
        self.values.iter().all(String::is_empty)
    }

    /// Parsed field values, `None` for blank or non-numeric text.
    pub fn numbers(&self) -> [Option<f32>; 9] {
        FieldId::ALL.map(|field| parse_number(self.read(field)))
    }

    /// One-line summary, e.g. for a window title.
    pub fn summary(&self) -> String {
        let group = |start: usize| self.values[start..start + 3].join(", ");
        format!("pos ({}) rot ({}) scale ({})", group(0), group(3), group(6))
    }
}

impl FieldView for TextFields {
    fn write(&mut self, field: FieldId, text: &str) -> Option<FieldInput> {
        let slot = &mut self.values[field.index()];
        slot.clear();
        slot.push_str(text);
        self.echo_writes.then(|| FieldInput {
            field,
            text: text.to_string(),
        })
    }

    fn read(&self, field: FieldId) -> &str {
        &self.values[field.index()]
    }
}

/// What happened to a field edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    Applied,
    /// Applied after raising a scale below the floor.
    Clamped,
    /// Raised by a programmatic write.
    Echo,
    /// Not a finite number; the node is left as it was.
    Rejected,
}

/// Two-way binding between the fields and a node transform.
#[derive(Debug)]
pub struct FieldSync {
    writing: bool,
    min_scale: f32,
}

impl Default for FieldSync {
    fn default() -> Self {
        Self::new(MIN_SCALE)
    }
}

impl FieldSync {
    pub fn new(min_scale: f32) -> Self {
        Self {
            writing: false,
            min_scale,
        }
    }

    pub fn is_writing(&self) -> bool {
        self.writing
    }

    /// Copy `transform` into every field. Echoes raised by the writes are routed
    /// back through [`FieldSync::on_input`] and dropped by the guard.
    pub fn refresh(&mut self, view: &mut dyn FieldView, transform: &mut Transform) {
        let texts = format_transform(transform);
        self.writing = true;
        for (field, text) in FieldId::ALL.into_iter().zip(texts.iter()) {
            if let Some(echo) = view.write(field, text) {
                self.on_input(&echo, transform);
            }
        }
        self.writing = false;
        log::debug!("fields refreshed: {:?}", texts);
    }

    /// Blank every field.
    pub fn clear(&mut self, view: &mut dyn FieldView) {
        self.writing = true;
        for field in FieldId::ALL {
            // Nothing is bound, so echoes have nowhere to go.
            let _ = view.write(field, "");
        }
        self.writing = false;
    }

    /// Apply one field edit to `transform`.
    pub fn on_input(&mut self, input: &FieldInput, transform: &mut Transform) -> InputOutcome {
        if self.writing {
            return InputOutcome::Echo;
        }
        let Some(value) = parse_number(&input.text) else {
            log::debug!("ignoring non-numeric {} input {:?}", input.field.label(), input.text);
            return InputOutcome::Rejected;
        };
        let axis = input.field.axis();
        match input.field.component() {
            Component::Position => transform.position[axis] = value,
            Component::Rotation => transform.rotation[axis] = value.to_radians(),
            Component::Scale if value < self.min_scale => {
                transform.scale[axis] = self.min_scale;
                return InputOutcome::Clamped;
            }
            Component::Scale => transform.scale[axis] = value,
        }
        InputOutcome::Applied
    }

    /// Apply every field's current text, as if each had just been edited.
    pub fn commit_all(&mut self, view: &dyn FieldView, transform: &mut Transform) -> usize {
        FieldId::ALL
            .into_iter()
            .map(|field| FieldInput {
                field,
                text: view.read(field).to_string(),
            })
            .filter(|input| {
                matches!(
                    self.on_input(input, transform),
                    InputOutcome::Applied | InputOutcome::Clamped
                )
            })
            .count()
    }
}

/// Display text for each field: two decimals for position and scale, whole
/// degrees for rotation.
pub fn format_transform(transform: &Transform) -> [String; 9] {
    FieldId::ALL.map(|field| {
        let axis = field.axis();
        match field.component() {
            Component::Position => fixed(transform.position[axis], 2),
            Component::Rotation => fixed(transform.rotation[axis].to_degrees(), 0),
            Component::Scale => fixed(transform.scale[axis], 2),
        }
    })
}

fn fixed(value: f32, decimals: usize) -> String {
    let text = format!("{:.*}", decimals, value);
    // "-0.00" reads as a change to the user.
    if text.starts_with('-') && text[1..].chars().all(|c| c == '0' || c == '.') {
        text[1..].to_string()
    } else {
        text
    }
}

fn parse_number(text: &str) -> Option<f32> {
    text.trim().parse::<f32>().ok().filter(|value| value.is_finite())
}
