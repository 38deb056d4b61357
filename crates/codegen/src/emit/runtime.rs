// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Fixed C support code shared by both stages.

use kiln_plan::{DataType, NodeId, ScanColumn};

use super::expr::c_type;
use crate::writer::{Block, c_string};

pub(crate) const INCLUDES: &str = "\
#include <math.h>
#include <stdint.h>
#include <stdio.h>
#include <stdlib.h>
#include <string.h>
#include <time.h>
";

pub(crate) const STATUS_CODES: &str = "\
#define KILN_OK 0
#define KILN_IO_ERROR 2
#define KILN_ALLOC_ERROR 3
#define KILN_CHECK_ERROR 4
";

/// Error exits jump to the `kiln_done` label of the enclosing function, which
/// must declare `int kiln_status`.
pub(crate) const CONTROL_MACROS: &str = "\
#define KILN_FAIL(code) do { kiln_status = (code); goto kiln_done; } while (0)
#define KILN_RESIZE(ptr, count) do { \\
	void *kiln_grown = realloc((ptr), (count) * sizeof(*(ptr))); \\
	if (!kiln_grown) KILN_FAIL(KILN_ALLOC_ERROR); \\
	(ptr) = kiln_grown; \\
} while (0)
";

pub(crate) const CHECK_ENABLED: &str = "#define KILN_CHECK(cond) do { if (!(cond)) KILN_FAIL(KILN_CHECK_ERROR); } while (0)\n";

pub(crate) const CHECK_ELIDED: &str = "#define KILN_CHECK(cond) ((void)(cond))\n";

/// Integer division that records a fault instead of trapping.
pub(crate) const CHECKED_DIVISION: &str = "\
static int kiln_fault;

static inline int64_t kiln_idiv(int64_t a, int64_t b)
{
	if (b == 0 || (a == INT64_MIN && b == -1)) {
		kiln_fault = 1;
		return 0;
	}
	return a / b;
}
";

pub(crate) const HELPERS: &str = "\
static inline uint64_t kiln_hash_i64(int64_t value)
{
	uint64_t x = (uint64_t)value;
	x ^= x >> 33;
	x *= UINT64_C(0xff51afd7ed558ccd);
	x ^= x >> 33;
	x *= UINT64_C(0xc4ceb9fe1a85ec53);
	x ^= x >> 33;
	return x;
}

static inline uint64_t kiln_hash_f64(double value)
{
	uint64_t bits;
	if (value == 0.0)
		value = 0.0;
	memcpy(&bits, &value, sizeof(bits));
	return kiln_hash_i64((int64_t)bits);
}

static inline uint64_t kiln_hash_text(const char *text)
{
	uint64_t h = 0;
	while (*text)
		h = (h * 31) ^ (unsigned char)*text++;
	return kiln_hash_i64((int64_t)h);
}

/* SQL LIKE: '%' matches any run of bytes, '_' exactly one byte. */
static inline int kiln_like(const char *text, const char *pattern)
{
	const char *star = NULL, *resume = NULL;
	while (*text) {
		if (*pattern == '%') {
			star = pattern++;
			resume = text;
		} else if (*pattern == '_' || *pattern == *text) {
			pattern++;
			text++;
		} else if (star) {
			pattern = star + 1;
			text = ++resume;
		} else {
			return 0;
		}
	}
	while (*pattern == '%')
		pattern++;
	return *pattern == '\\0';
}

static inline uint64_t kiln_hash_combine(uint64_t seed, uint64_t hash)
{
	return seed ^ (hash + UINT64_C(0x9e3779b97f4a7c15) + (seed << 6) + (seed >> 2));
}

static inline size_t kiln_table_size(size_t rows)
{
	size_t size = 16;
	while (size < rows * 2)
		size *= 2;
	return size;
}

static inline int32_t kiln_days_from_civil(int y, int m, int d)
{
	int era, yoe, doy, doe;
	y -= m <= 2;
	era = (y >= 0 ? y : y - 399) / 400;
	yoe = y - era * 400;
	doy = (153 * (m > 2 ? m - 3 : m + 9) + 2) / 5 + d - 1;
	doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
	return (int32_t)(era * 146097 + doe - 719468);
}

static inline void kiln_print_date(FILE *out, int32_t days)
{
	long z = (long)days + 719468;
	long era = (z >= 0 ? z : z - 146096) / 146097;
	long doe = z - era * 146097;
	long yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
	long doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
	long mp = (5 * doy + 2) / 153;
	long d = doy - (153 * mp + 2) / 5 + 1;
	long m = mp < 10 ? mp + 3 : mp - 9;
	long y = yoe + era * 400 + (m <= 2);
	fprintf(out, \"%04ld-%02ld-%02ld\", y, m, d);
}

static inline int kiln_parse_i64(const char *text, int64_t *out)
{
	char *end;
	*out = (int64_t)strtoll(text, &end, 10);
	return end != text && *end == '\\0';
}

static inline int kiln_parse_f64(const char *text, double *out)
{
	char *end;
	*out = strtod(text, &end);
	return end != text && *end == '\\0';
}

static inline int kiln_parse_date(const char *text, int32_t *out)
{
	int i, y, m, d;
	for (i = 0; i < 10; i++) {
		if (i == 4 || i == 7) {
			if (text[i] != '-')
				return 0;
		} else if (text[i] < '0' || text[i] > '9') {
			return 0;
		}
	}
	if (text[10] != '\\0')
		return 0;
	y = (text[0] - '0') * 1000 + (text[1] - '0') * 100 + (text[2] - '0') * 10 + (text[3] - '0');
	m = (text[5] - '0') * 10 + (text[6] - '0');
	d = (text[8] - '0') * 10 + (text[9] - '0');
	*out = kiln_days_from_civil(y, m, d);
	return m >= 1 && m <= 12 && d >= 1 && d <= 31;
}

/* Reads one line without its terminator. Returns the length, -1 at end of
 * input and -2 when the line buffer cannot grow. */
static inline long kiln_read_line(FILE *in, char **line, size_t *cap)
{
	size_t len = 0;
	int ch;
	if (*cap == 0) {
		*line = malloc(256);
		if (!*line)
			return -2;
		*cap = 256;
	}
	while ((ch = getc(in)) != EOF && ch != '\\n') {
		if (len + 1 >= *cap) {
			char *grown = realloc(*line, *cap * 2);
			if (!grown)
				return -2;
			*line = grown;
			*cap *= 2;
		}
		(*line)[len++] = (char)ch;
	}
	if (ch == EOF && len == 0)
		return -1;
	if (len > 0 && (*line)[len - 1] == '\\r')
		len--;
	(*line)[len] = '\\0';
	return (long)len;
}

/* Copies text, terminator included, to the end of a growable arena and stores
 * its offset. Returns 0 when the arena cannot grow. */
static inline int kiln_store_text(char **arena, size_t *len, size_t *cap, const char *text, size_t *offset)
{
	size_t n = strlen(text) + 1;
	if (*len + n > *cap) {
		size_t size = *cap ? *cap : 4096;
		char *grown;
		while (size < *len + n)
			size *= 2;
		grown = realloc(*arena, size);
		if (!grown)
			return 0;
		*arena = grown;
		*cap = size;
	}
	memcpy(*arena + *len, text, n);
	*offset = *len;
	*len += n;
	return 1;
}

/* Splits a line on commas in place. Fields past the end of the line read as
 * empty strings. Returns the number of fields present. */
static inline size_t kiln_split(char *line, char **fields, size_t max)
{
	size_t n = 0, i;
	char *p = line;
	for (;;) {
		char *comma = strchr(p, ',');
		if (n < max)
			fields[n] = p;
		n++;
		if (!comma)
			break;
		*comma = '\\0';
		p = comma + 1;
	}
	for (i = n; i < max; i++)
		fields[i] = \"\";
	return n;
}
";

pub(crate) fn scan_struct(node: NodeId) -> String {
	format!("kiln_scan{}", node)
}

pub(crate) fn scan_var(node: NodeId) -> String {
	format!("s{}", node)
}

/// Emits the column store and CSV loader of one scan.
pub(crate) fn emit_loader(out: &mut Block, node: NodeId, table: &str, columns: &[ScanColumn]) {
	let name = scan_struct(node);
	let fields = columns.iter().map(|column| column.index as usize + 1).max().unwrap_or(1);
	let has_text = text_columns(columns).next().is_some();

	out.line("typedef struct {");
	out.line("\tsize_t rows;");
	out.line("\tsize_t cap;");
	for (position, column) in columns.iter().enumerate() {
		out.line(format!("\t{} *c{};", c_type(column.ty), position));
	}
	// text cells are arena offsets while loading, pointers once the arena stops moving
	for position in text_columns(columns) {
		out.line(format!("\tsize_t *o{};", position));
	}
	if has_text {
		out.line("\tchar *text;");
		out.line("\tsize_t text_len;");
		out.line("\tsize_t text_cap;");
	}
	out.line(format!("}} {};", name));
	out.line("");

	out.line(format!("static int kiln_load_{}(const char *db, {} *t)", scan_var(node), name));
	out.open("");
	out.line("int kiln_status = KILN_OK;");
	out.line("char path[4096];");
	out.line("char *line = NULL;");
	out.line("size_t cap = 0;");
	out.line(format!("char *fields[{}];", fields));
	out.line("long len;");
	out.line("FILE *in;");
	out.line("");
	out.line(format!(
		"if (snprintf(path, sizeof(path), \"%s/%s.csv\", db, {}) >= (int)sizeof(path))",
		c_string(table)
	));
	out.line("\treturn KILN_IO_ERROR;");
	out.line("in = fopen(path, \"r\");");
	out.line("if (!in)");
	out.line("\treturn KILN_IO_ERROR;");
	out.open("while ((len = kiln_read_line(in, &line, &cap)) >= 0)");
	out.line("size_t count;");
	out.line("if (len == 0)");
	out.line("\tcontinue;");
	out.line(format!("count = kiln_split(line, fields, {});", fields));
	out.line(format!("KILN_CHECK(count >= {});", fields));
	out.open("if (t->rows == t->cap)");
	out.line("t->cap = t->cap ? t->cap * 2 : 1024;");
	for position in 0..columns.len() {
		out.line(format!("KILN_RESIZE(t->c{}, t->cap);", position));
	}
	for position in text_columns(columns) {
		out.line(format!("KILN_RESIZE(t->o{}, t->cap);", position));
	}
	out.close();
	for (position, column) in columns.iter().enumerate() {
		let parse = match column.ty {
			DataType::Int64 => "kiln_parse_i64",
			DataType::Float64 => "kiln_parse_f64",
			DataType::Date | DataType::Bool => "kiln_parse_date",
			DataType::Text => {
				out.line(format!(
					"if (!kiln_store_text(&t->text, &t->text_len, &t->text_cap, fields[{}], &t->o{}[t->rows]))",
					column.index, position
				));
				out.line("\tKILN_FAIL(KILN_ALLOC_ERROR);");
				continue;
			}
		};
		out.line(format!("KILN_CHECK({}(fields[{}], &t->c{}[t->rows]));", parse, column.index, position));
	}
	out.line("t->rows++;");
	out.close();
	out.line("if (len == -2)");
	out.line("\tKILN_FAIL(KILN_ALLOC_ERROR);");
	out.line("if (ferror(in))");
	out.line("\tKILN_FAIL(KILN_IO_ERROR);");
	for position in text_columns(columns) {
		out.line("for (size_t r = 0; r < t->rows; r++)");
		out.line(format!("\tt->c{p}[r] = t->text + t->o{p}[r];", p = position));
	}
	out.line("kiln_done:");
	out.line("free(line);");
	out.line("fclose(in);");
	out.line("return kiln_status;");
	out.close();
	out.line("");
}

/// Positions of the text columns of a scan.
pub(crate) fn text_columns(columns: &[ScanColumn]) -> impl Iterator<Item = usize> + '_ {
	columns.iter().enumerate().filter(|(_, column)| column.ty == DataType::Text).map(|(position, _)| position)
}

/// Emits `kiln_print_row`, writing one result row in the output format.
pub(crate) fn emit_printer(out: &mut Block, schema: &[DataType]) {
	let params = schema
		.iter()
		.enumerate()
		.map(|(position, ty)| format!("{} v{}", c_type(*ty), position))
		.collect::<Vec<_>>()
		.join(", ");

	out.line(format!("static void kiln_print_row(FILE *out, {})", params));
	out.open("");
	for (position, ty) in schema.iter().enumerate() {
		if position > 0 {
			out.line("fputs(\", \", out);");
		}
		let value = format!("v{}", position);
		out.line(match ty {
			DataType::Int64 => format!("fprintf(out, \"%lld\", (long long){});", value),
			DataType::Float64 => format!("fprintf(out, \"%.2f\", {});", value),
			DataType::Date => format!("kiln_print_date(out, {});", value),
			DataType::Text => format!("fputs({}, out);", value),
			DataType::Bool => format!("fputs({} ? \"true\" : \"false\", out);", value),
		});
	}
	out.line("fputc('\\n', out);");
	out.close();
	out.line("");
}
