// Copyright (c) The suitemill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serialize a `Testsuite`.

use crate::{Testcase, TestcaseStatus, Testsuite};
use quick_xml::{
    Writer,
    events::{BytesCData, BytesDecl, BytesEnd, BytesStart, Event},
};
use std::{io, time::Duration};

pub(crate) static TESTSUITE_TAG: &str = "testsuite";
pub(crate) static TESTCASE_TAG: &str = "testcase";
pub(crate) static SYSTEM_OUT_TAG: &str = "system-out";

pub(crate) fn serialize_testsuite(
    testsuite: &Testsuite,
    writer: impl io::Write,
) -> quick_xml::Result<()> {
    let mut writer = Writer::new_with_indent(writer, b' ', 4);

    let decl = BytesDecl::new("1.0", Some("UTF-8"), None);
    writer.write_event(Event::Decl(decl))?;

    // Use the destructuring syntax to ensure that all fields are handled.
    let Testsuite {
        name,
        time,
        testcases,
        system_out,
    } = testsuite;

    let mut testsuite_tag = BytesStart::new(TESTSUITE_TAG);
    testsuite_tag.extend_attributes([
        ("name", name.as_str()),
        ("tests", testsuite.tests().to_string().as_str()),
        ("failures", testsuite.failures().to_string().as_str()),
        ("errors", testsuite.errors().to_string().as_str()),
        ("time", serialize_time(time).as_str()),
    ]);
    writer.write_event(Event::Start(testsuite_tag))?;

    for testcase in testcases {
        serialize_testcase(testcase, &mut writer)?;
    }

    writer.write_event(Event::Start(BytesStart::new(SYSTEM_OUT_TAG)))?;
    serialize_cdata(system_out.as_str(), &mut writer)?;
    writer.write_event(Event::End(BytesEnd::new(SYSTEM_OUT_TAG)))?;

    writer.write_event(Event::End(BytesEnd::new(TESTSUITE_TAG)))?;
    writer.write_event(Event::Eof)?;

    // Add a trailing newline.
    writer
        .get_mut()
        .write_all(b"\n")
        .map_err(|err| quick_xml::Error::Io(err.into()))
}

fn serialize_testcase(
    testcase: &Testcase,
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    let Testcase {
        full_name,
        classname,
        name,
        owner,
        dev_owner,
        services,
        file_path,
        tcid,
        time,
        status,
    } = testcase;

    let mut testcase_tag = BytesStart::new(TESTCASE_TAG);
    testcase_tag.extend_attributes([
        ("full_name", full_name.as_str()),
        ("classname", classname.as_str()),
        ("owner", owner.as_str()),
        ("dev_owner", dev_owner.as_str()),
        ("services", services.as_str()),
        ("name", name.as_str()),
        ("file_path", file_path.as_str()),
    ]);
    if let Some(tcid) = tcid {
        testcase_tag.push_attribute(("tcid", tcid.as_str()));
    }
    testcase_tag.push_attribute(("time", serialize_time(time).as_str()));

    match status {
        TestcaseStatus::Success => {
            writer.write_event(Event::Empty(testcase_tag))?;
        }
        TestcaseStatus::NonSuccess {
            kind,
            message,
            ty,
            description,
        } => {
            writer.write_event(Event::Start(testcase_tag))?;

            let tag_name = kind.tag();
            let mut tag = BytesStart::new(tag_name);
            if let Some(message) = message {
                tag.push_attribute(("message", message.as_str()));
            }
            if let Some(ty) = ty {
                tag.push_attribute(("type", ty.as_str()));
            }
            match description {
                Some(description) => {
                    writer.write_event(Event::Start(tag))?;
                    serialize_cdata(description, writer)?;
                    writer.write_event(Event::End(BytesEnd::new(tag_name)))?;
                }
                None => {
                    writer.write_event(Event::Empty(tag))?;
                }
            }

            writer.write_event(Event::End(BytesEnd::new(TESTCASE_TAG)))?;
        }
    }

    Ok(())
}

fn serialize_cdata(text: &str, writer: &mut Writer<impl io::Write>) -> quick_xml::Result<()> {
    let text = escape_cdata_end(text);
    writer.write_event(Event::CData(BytesCData::new(text.as_str())))
}

/// Replaces the CDATA terminator so that arbitrary text can't end the section early.
///
/// This is lossy: the text reads back with `]]&gt;` in place of `]]>`.
pub(crate) fn escape_cdata_end(text: &str) -> String {
    text.replace("]]>", "]]&gt;")
}

// Serialize time as seconds with 3 decimal points.
fn serialize_time(time: &Duration) -> String {
    format!("{:.3}", time.as_secs_f64())
}
